//! Resolver configuration.
//!
//! Endpoints and timeouts live here so that tests can point the resolver at
//! local mock servers; production callers use [`Config::default`].

use std::time::Duration;

use url::Url;

/// Configuration for a [`Resolver`](crate::resolver::Resolver).
///
/// The sync host for the second socket is not configured here: it is
/// returned by the redirector per call. Its URL scheme (`wss` or `ws`)
/// follows the scheme of `redirector_url`, which lets tests run the whole
/// exchange against plaintext local servers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    /// `User-Agent` for catalog API requests.
    pub user_agent: String,

    /// WebSocket endpoint of the session redirector.
    pub redirector_url: Url,

    /// Base URL of the catalog API.
    pub catalog_url: Url,

    /// Fixed `Origin` header required by the sync service.
    pub origin: String,

    /// Bound on establishing each WebSocket connection.
    pub connect_timeout: Duration,

    /// Bound on the whole redirect negotiation step.
    pub negotiation_timeout: Duration,

    /// Bound on the single state receive on the sync socket.
    pub receive_timeout: Duration,

    /// Whether to ask the catalog for the highest available bitrate first.
    pub prefer_high_quality: bool,
}

impl Config {
    /// The fixed redirector endpoint of the sync service.
    const REDIRECTOR_URL: &'static str =
        "wss://ynison.music.yandex.ru/redirector.YnisonRedirectService/GetRedirectToYnison";

    /// The public catalog API.
    const CATALOG_URL: &'static str = "https://api.music.yandex.net";

    /// The `Origin` the sync service expects from web devices.
    const ORIGIN: &'static str = "http://music.yandex.ru";

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(15);
    const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration with production endpoints and the
    /// recommended timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the compiled-in endpoint constants are invalid URLs.
    #[must_use]
    pub fn new() -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            user_agent,

            redirector_url: Self::REDIRECTOR_URL
                .parse()
                .expect("invalid redirector url"),
            catalog_url: Self::CATALOG_URL.parse().expect("invalid catalog url"),
            origin: Self::ORIGIN.to_owned(),

            connect_timeout: Self::CONNECT_TIMEOUT,
            negotiation_timeout: Self::NEGOTIATION_TIMEOUT,
            receive_timeout: Self::RECEIVE_TIMEOUT,

            prefer_high_quality: true,
        }
    }

    /// The URL scheme for the sync host socket, following the scheme of the
    /// redirector endpoint.
    #[must_use]
    pub fn sync_scheme(&self) -> &'static str {
        if self.redirector_url.scheme() == "ws" {
            "ws"
        } else {
            "wss"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
