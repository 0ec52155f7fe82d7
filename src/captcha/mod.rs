//! Captcha token acquisition
//!
//! The scheduling service gates its auth endpoint behind a captcha. Solving
//! is external to this crate: the engine only consumes an opaque token
//! through [`CaptchaTokenProvider`]. Obtaining a token may block for an
//! externally-variable duration; it is the slowest step of a run and is not
//! retried here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Supplier of opaque captcha tokens
#[async_trait]
pub trait CaptchaTokenProvider: Send + Sync {
    /// Produce one fresh captcha token
    async fn token(&self) -> Result<String>;
}

/// Reads a token pasted into the terminal.
///
/// The operator solves the captcha in a browser and pastes the resulting
/// token at the prompt.
pub struct PromptTokenProvider;

#[async_trait]
impl CaptchaTokenProvider for PromptTokenProvider {
    async fn token(&self) -> Result<String> {
        println!("Solve the captcha in your browser and paste the token:");

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader
            .read_line(&mut line)
            .await
            .context("Failed to read captcha token from stdin")?;

        let token = line.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("empty captcha token");
        }
        Ok(token)
    }
}

/// Returns a pre-supplied token. Used in tests and for externally-solved
/// tokens passed through the environment.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CaptchaTokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
