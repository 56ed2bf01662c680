//! Catalog API client.
//!
//! Resolves playable ids from the sync protocol into track metadata and
//! signed direct download links. The resolver consumes this module through
//! the [`Catalog`] trait, which keeps the API a black box: only the call
//! contract matters, and tests substitute an in-memory implementation.

use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    config::Config,
    error::{Error, Result},
    http,
    protocol::catalog::{DownloadInfo, LinkKey, Response, SearchResult, Track},
    token::Token,
};

/// The catalog call contract.
///
/// All methods take the account credential per call: the client itself is
/// shared across accounts and holds no per-account state.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches the download variants of a track, usable ones only, ordered
    /// by preference.
    ///
    /// With `prefer_high_quality` the highest bitrate comes first;
    /// otherwise the lowest.
    async fn download_info(
        &self,
        token: &Token,
        track_id: u64,
        prefer_high_quality: bool,
    ) -> Result<Vec<DownloadInfo>>;

    /// Resolves a variant into a direct download URL.
    async fn direct_url(&self, token: &Token, info: &DownloadInfo) -> Result<Url>;

    /// Fetches the metadata of a track.
    async fn track(&self, token: &Token, track_id: u64) -> Result<Track>;

    /// Searches the catalog for tracks.
    async fn search(&self, token: &Token, query: &str) -> Result<Vec<Track>>;
}

/// HTTP implementation of [`Catalog`] against the public catalog API.
pub struct Client {
    http_client: http::Client,
    base_url: Url,
}

impl Client {
    /// Salt mixed into the direct-link signature.
    ///
    /// Fixed value the storage hosts validate; shared by all clients of the
    /// API.
    const SIGNING_SALT: &'static str = "XGRlBW9FXlekgbPrRHuSiA";

    /// Creates a new client for the catalog endpoint in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: http::Client::new(config)?,
            base_url: config.catalog_url.clone(),
        })
    }

    /// Performs an authenticated GET and parses the JSON response.
    async fn get<T>(&self, token: &Token, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut authorization = reqwest::header::HeaderValue::from_str(&token.authorization())?;
        authorization.set_sensitive(true);

        let mut request = self.http_client.get(url, "");
        request.headers_mut().insert(AUTHORIZATION, authorization);

        let response = self.http_client.execute(request).await?;
        let response = response.error_for_status().map_err(Error::from)?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Builds the signed direct link from fetched key material.
    fn sign_link(key: &LinkKey) -> Result<Url> {
        let path = key.path.strip_prefix('/').unwrap_or(&key.path);

        let mut hasher = Md5::new();
        hasher.update(Self::SIGNING_SALT.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(key.s.as_bytes());
        let sign = format!("{:x}", hasher.finalize());

        format!("https://{}/get-mp3/{}/{}{}", key.host, sign, key.ts, key.path)
            .parse()
            .map_err(|e: url::ParseError| {
                Error::invalid_argument(format!("link key does not form a URL: {e}"))
            })
    }
}

#[async_trait]
impl Catalog for Client {
    async fn download_info(
        &self,
        token: &Token,
        track_id: u64,
        prefer_high_quality: bool,
    ) -> Result<Vec<DownloadInfo>> {
        let url = self
            .base_url
            .join(&format!("tracks/{track_id}/download-info"))?;
        let response: Response<Vec<DownloadInfo>> = self.get(token, url).await?;

        let mut variants: Vec<_> = response
            .result
            .into_iter()
            .filter(DownloadInfo::is_usable)
            .collect();
        if prefer_high_quality {
            variants.sort_by(|a, b| b.bitrate_in_kbps.cmp(&a.bitrate_in_kbps));
        } else {
            variants.sort_by(|a, b| a.bitrate_in_kbps.cmp(&b.bitrate_in_kbps));
        }

        trace!(
            "track {track_id}: {} usable download variants",
            variants.len()
        );
        Ok(variants)
    }

    async fn direct_url(&self, token: &Token, info: &DownloadInfo) -> Result<Url> {
        let mut url = info.download_info_url.clone();
        url.query_pairs_mut().append_pair("format", "json");

        let key: LinkKey = self.get(token, url).await?;
        Self::sign_link(&key)
    }

    async fn track(&self, token: &Token, track_id: u64) -> Result<Track> {
        let url = self.base_url.join(&format!("tracks/{track_id}"))?;
        let response: Response<Vec<Track>> = self.get(token, url).await?;

        response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("track {track_id} not found")))
    }

    async fn search(&self, token: &Token, query: &str) -> Result<Vec<Track>> {
        let mut url = self.base_url.join("search")?;
        url.query_pairs_mut()
            .append_pair("text", query)
            .append_pair("type", "track")
            .append_pair("page", "0");

        let response: Response<SearchResult> = self.get(token, url).await?;
        Ok(response
            .result
            .tracks
            .map(|page| page.results)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Token {
        Token::new("y0_testtoken12345678").unwrap()
    }

    fn client(server: &mockito::ServerGuard) -> Client {
        let mut config = Config::new();
        config.catalog_url = server.url().parse().unwrap();
        Client::new(&config).unwrap()
    }

    #[test]
    fn signed_link_has_expected_shape() {
        let key = LinkKey {
            host: "storage.example".to_owned(),
            path: "/org/12/abcdef".to_owned(),
            ts: "63a1b2c3".to_owned(),
            s: "seed".to_owned(),
        };

        let url = Client::sign_link(&key).unwrap();
        assert_eq!(url.host_str(), Some("storage.example"));

        let segments: Vec<_> = url.path_segments().unwrap().collect();
        assert_eq!(segments[0], "get-mp3");
        // MD5 over salt, unprefixed path and seed: 32 hex digits.
        assert_eq!(segments[1].len(), 32);
        assert!(segments[1].chars().all(|chr| chr.is_ascii_hexdigit()));
        assert!(url.path().ends_with("/63a1b2c3/org/12/abcdef"));
    }

    #[test]
    fn signature_depends_on_key_material() {
        let key = LinkKey {
            host: "storage.example".to_owned(),
            path: "/org/12/abcdef".to_owned(),
            ts: "63a1b2c3".to_owned(),
            s: "seed".to_owned(),
        };
        let other = LinkKey {
            s: "different-seed".to_owned(),
            ..key.clone()
        };

        assert_ne!(
            Client::sign_link(&key).unwrap(),
            Client::sign_link(&other).unwrap()
        );
    }

    #[tokio::test]
    async fn download_info_orders_variants_by_preference() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tracks/123/download-info")
            .match_header("authorization", "OAuth y0_testtoken12345678")
            .with_body(
                r#"{"result": [
                    {"codec": "mp3", "bitrateInKbps": 192,
                     "downloadInfoUrl": "https://storage.example/a"},
                    {"codec": "mp3", "bitrateInKbps": 320,
                     "downloadInfoUrl": "https://storage.example/b"},
                    {"codec": "mp3", "bitrateInKbps": 320, "preview": true,
                     "downloadInfoUrl": "https://storage.example/c"}
                ]}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let client = client(&server);
        let variants = client.download_info(&token(), 123, true).await.unwrap();

        // The preview variant is filtered out; the rest sort by bitrate.
        let bitrates: Vec<_> = variants.iter().map(|v| v.bitrate_in_kbps).collect();
        assert_eq!(bitrates, vec![320, 192]);

        let lowest_first = client.download_info(&token(), 123, false).await.unwrap();
        assert_eq!(lowest_first[0].bitrate_in_kbps, 192);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn track_metadata_round_trip() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tracks/456")
            .with_body(
                r#"{"result": [{
                    "id": "456",
                    "title": "Song",
                    "artists": [{"id": 1, "name": "Artist"}],
                    "durationMs": 200000,
                    "available": true
                }]}"#,
            )
            .create_async()
            .await;

        let client = client(&server);
        let track = client.track(&token(), 456).await.unwrap();
        assert_eq!(track.id, 456);
        assert_eq!(track.title, "Song");
        assert_eq!(track.artist_names(), "Artist");
    }

    #[tokio::test]
    async fn missing_track_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tracks/789")
            .with_body(r#"{"result": []}"#)
            .create_async()
            .await;

        let client = client(&server);
        let err = client.track(&token(), 789).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn direct_url_fetches_key_and_signs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/info")
            .match_query(mockito::Matcher::UrlEncoded(
                "format".into(),
                "json".into(),
            ))
            .with_body(
                r#"{"host": "storage.example", "path": "/org/1/x", "ts": "5f", "s": "seed"}"#,
            )
            .create_async()
            .await;

        let client = client(&server);
        let info: DownloadInfo = serde_json::from_str(&format!(
            r#"{{"codec": "mp3", "bitrateInKbps": 320, "downloadInfoUrl": "{}/info"}}"#,
            server.url()
        ))
        .unwrap();

        let url = client.direct_url(&token(), &info).await.unwrap();
        assert_eq!(url.host_str(), Some("storage.example"));
        assert!(url.path().starts_with("/get-mp3/"));
    }

    #[tokio::test]
    async fn search_returns_track_section() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("text".into(), "song".into()),
                mockito::Matcher::UrlEncoded("type".into(), "track".into()),
            ]))
            .with_body(
                r#"{"result": {"tracks": {"total": 1, "perPage": 20, "results": [
                    {"id": 456, "title": "Song", "artists": [], "durationMs": 1000}
                ]}}}"#,
            )
            .create_async()
            .await;

        let client = client(&server);
        let tracks = client.search(&token(), "song").await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Song");
    }
}
