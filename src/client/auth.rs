//! Session token management
//!
//! Owns the bearer token and the cached captcha token. The token is absent
//! until the first successful exchange and is overwritten on every refresh.
//! There is no expiry timer: refresh happens once proactively at run start
//! and reactively whenever the API answers 401.

use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::captcha::CaptchaTokenProvider;
use crate::error::{FatalError, Result};
use crate::models::Session;

use super::headers::build_headers;

/// Auth endpoint path. The response body is the token itself as plain text,
/// not JSON.
pub const AUTH_PATH: &str = "/api/auth";

/// Payload for the captcha-for-token exchange
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    username: &'a str,
    captcha_token: &'a str,
}

/// Owns and refreshes the session bearer token
pub struct AuthManager {
    session: RwLock<Session>,
    provider: Arc<dyn CaptchaTokenProvider>,
    username: String,
}

impl AuthManager {
    pub fn new(
        user_agent: impl Into<String>,
        username: impl Into<String>,
        provider: Arc<dyn CaptchaTokenProvider>,
    ) -> Self {
        Self {
            session: RwLock::new(Session::new(user_agent)),
            provider,
            username: username.into(),
        }
    }

    /// Current bearer token, if authenticated
    pub async fn bearer(&self) -> Option<String> {
        self.session.read().await.bearer_token.clone()
    }

    /// Exchange a captcha token for a session token and store it.
    ///
    /// The captcha token is fetched from the provider only when none is
    /// cached; acquisition can block for an externally-variable duration and
    /// is not retried. Any failure here is fatal: the engine cannot proceed
    /// without a session.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::CaptchaUnavailable`] when the provider fails and
    /// [`FatalError::AuthFailed`] when the exchange is rejected.
    pub async fn refresh(&self, http: &Client, base_url: &str, origin: &str) -> Result<String> {
        let captcha_token = self.captcha_token().await?;
        let user_agent = self.session.read().await.user_agent.clone();

        let payload = AuthRequest {
            username: &self.username,
            captcha_token: &captcha_token,
        };

        let url = format!("{base_url}{AUTH_PATH}");
        let response = http
            .post(&url)
            .headers(build_headers(&user_agent, origin))
            .json(&payload)
            .send()
            .await
            .map_err(|e| FatalError::AuthFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "token exchange rejected");
            return Err(FatalError::AuthFailed(format!("status {status}")).into());
        }

        let token = response
            .text()
            .await
            .map_err(|e| FatalError::AuthFailed(e.to_string()))?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(FatalError::AuthFailed("empty token in response".to_string()).into());
        }

        self.session.write().await.bearer_token = Some(token.clone());
        info!("session token refreshed");
        Ok(token)
    }

    // Reuse the cached captcha token or obtain a fresh one from the provider
    async fn captcha_token(&self) -> Result<String> {
        if let Some(cached) = self.session.read().await.captcha_token.clone() {
            return Ok(cached);
        }

        info!("requesting captcha token from provider");
        let token = self
            .provider
            .token()
            .await
            .map_err(|e| FatalError::CaptchaUnavailable(e.to_string()))?;

        self.session.write().await.captcha_token = Some(token.clone());
        Ok(token)
    }
}
