//! HTTP client for the scheduling API
//!
//! All requests are POST with a JSON body against a fixed base host. The
//! client owns the full response-classification policy, so callers may treat
//! every returned response as successful:
//!
//! - 200 is returned unchanged
//! - 401 triggers a token refresh and the same call is retried
//! - 403 means the remote rate limiter fired: back off and retry without
//!   a retry bound
//! - anything else is retried up to the configured cap, after which the
//!   failure is terminal
//!
//! Outbound requests are additionally paced by a local rate limiter so the
//! polling fan-out cannot burst.

use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::captcha::CaptchaTokenProvider;
use crate::config::Config;
use crate::error::{FatalError, Result};

pub mod auth;
pub mod headers;

use auth::AuthManager;
use headers::build_headers;

// Endpoint paths
pub const BOOKING: &str = "/api/booking";
pub const CANCEL_BOOKING: &str = "/api/cancel-booking";
pub const ELIGIBILITY: &str = "/api/eligibility";
pub const AVAILABLE_LOCATIONS: &str = "/api/available-locations";
pub const AVAILABLE_LOCATION_DATES: &str = "/api/available-location-dates";
pub const HOLD_SLOT: &str = "/api/hold-slot";
pub const NEW_BOOKING: &str = "/api/new-booking";

/// Client for the scheduling API
pub struct ApiClient {
    http: Client,
    base_url: String,
    origin: String,
    user_agent: String,
    max_retries: u32,
    rate_limit_backoff: Duration,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    auth: AuthManager,
}

impl ApiClient {
    /// Create a client from configuration.
    ///
    /// The user agent is chosen once here and reused for the process
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config, captcha: Arc<dyn CaptchaTokenProvider>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate = NonZeroU32::new(config.api.rate_limit.ceil() as u32).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rate));

        let user_agent = headers::pick_user_agent().to_string();
        let auth = AuthManager::new(
            user_agent.clone(),
            config.identity.username(),
            captcha,
        );

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            origin: config.origin().to_string(),
            user_agent,
            max_retries: config.api.max_retries,
            rate_limit_backoff: config.rate_limit_backoff(),
            limiter,
            auth,
        })
    }

    /// Base URL of the remote service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Refresh the session token proactively (start of a run)
    pub async fn authenticate(&self) -> Result<()> {
        self.auth
            .refresh(&self.http, &self.base_url, &self.origin)
            .await?;
        Ok(())
    }

    /// Issue a POST call and return the successful response.
    ///
    /// Retries are a bounded loop with one attempt counter. 401 and 403
    /// increment the counter but are never bounded by it; only the generic
    /// failure branch enforces `max_retries`.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::RetriesExhausted`] once generic failures pass
    /// the cap, or a fatal auth error bubbled up from the token refresh.
    pub async fn call<B>(&self, path: &str, body: &B) -> Result<Response>
    where
        B: Serialize + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            self.limiter.until_ready().await;

            let mut request = self
                .http
                .post(&url)
                .headers(build_headers(&self.user_agent, &self.origin))
                .json(body);
            if let Some(token) = self.auth.bearer().await {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => match response.status().as_u16() {
                    200 => return Ok(response),

                    401 => {
                        attempt += 1;
                        warn!(path, "session expired, refreshing token");
                        self.auth
                            .refresh(&self.http, &self.base_url, &self.origin)
                            .await?;
                    }

                    403 => {
                        attempt += 1;
                        warn!(
                            path,
                            backoff_secs = self.rate_limit_backoff.as_secs(),
                            "rate limited by remote, backing off"
                        );
                        tokio::time::sleep(self.rate_limit_backoff).await;
                    }

                    status => {
                        attempt += 1;
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(
                            path,
                            status,
                            attempt,
                            body = %body_text,
                            "request failed"
                        );
                        if attempt > self.max_retries {
                            return Err(FatalError::RetriesExhausted {
                                path: path.to_string(),
                                attempts: attempt,
                            }
                            .into());
                        }
                    }
                },

                Err(e) => {
                    attempt += 1;
                    warn!(path, attempt, error = %e, "transport error");
                    if attempt > self.max_retries {
                        return Err(FatalError::RetriesExhausted {
                            path: path.to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }
                }
            }
        }
    }

    /// POST and parse the response body as JSON
    pub async fn call_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.call(path, body).await?;
        Ok(response.json::<T>().await?)
    }

    /// POST and return the response body as text
    pub async fn call_text<B>(&self, path: &str, body: &B) -> Result<String>
    where
        B: Serialize + Sync,
    {
        let response = self.call(path, body).await?;
        Ok(response.text().await?)
    }
}
