//! HTTP client with rate limiting for the catalog API.
//!
//! Wraps `reqwest::Client` to add:
//! * Request rate limiting, so bursts of resolutions cannot hammer the
//!   catalog API
//! * Consistent timeouts and headers
//!
//! Rate limiting allows bursts up to the maximum calls per interval;
//! requests beyond that are delayed, never dropped.

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{self, Body, Method, Url};

use crate::{config::Config, error::Result};

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Unlimited request client for special cases.
    ///
    /// Direct access to the underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    /// Rate limiter applied by [`Client::execute`].
    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Length of the rolling rate limit window.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(5);

    /// Maximum calls per rolling window.
    ///
    /// The catalog API publishes no quota; this matches what the web client
    /// generates under heavy use and has proven safe.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 50;

    /// Duration to keep idle connections alive, preventing reconnection
    /// overhead for subsequent requests.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for individual network reads.
    const READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a new client with the configured user agent.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics if the compiled-in rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .user_agent(&config.user_agent);

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a request with specified method, URL and body.
    ///
    /// Creates a raw request that can be executed with [`Client::execute`].
    pub fn request<U, T>(&self, method: Method, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        let mut request = reqwest::Request::new(method, url.into());
        let body_mut = request.body_mut();
        *body_mut = Some(body.into());

        request
    }

    /// Builds a GET request.
    pub fn get<U, T>(&self, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        self.request(Method::GET, url, body)
    }

    /// Executes a request, delaying it if the rate limit demands.
    ///
    /// # Errors
    ///
    /// Returns error if request execution fails or a network error occurs.
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        // No need to await with jitter because the level of concurrency is low.
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.unlimited.execute(request).map_err(Into::into))
    }
}
