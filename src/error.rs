//! Unified error handling for the yeyak crate
//!
//! Two layers:
//!
//! - [`FatalError`] - terminal conditions that end the process. Core logic
//!   never exits by itself; it returns one of these and the binary performs
//!   the single `process::exit` with [`FatalError::exit_code`].
//! - [`Error`] - the crate-wide error enum wrapping fatal conditions and the
//!   recoverable transport/serialization failures underneath them.

use std::io;
use thiserror::Error;

/// Terminal conditions that require human intervention or mark a deliberate
/// stop. Never retried.
#[derive(Error, Debug)]
pub enum FatalError {
    /// Token exchange at the auth endpoint failed or returned no token
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The captcha token supplier could not produce a token
    #[error("captcha token unavailable: {0}")]
    CaptchaUnavailable(String),

    /// A remote call kept failing past the configured retry cap
    #[error("remote call to {path} failed after {attempts} attempts")]
    RetriesExhausted { path: String, attempts: u32 },

    /// Manual selection returned no locations
    #[error("no locations were selected")]
    EmptySelection,

    /// The service returned no candidate locations for any configured input
    #[error("no candidate locations returned for the configured zip codes or city")]
    NoLocationsFound,

    /// Candidates exist but all are farther than the configured limit.
    /// A deliberate stop, not an error: the nearest distance is known.
    #[error("nearest location is {nearest:.1} miles away, beyond the {max:.1} mile limit")]
    NoLocationInRange { nearest: f64, max: f64 },

    /// An existing booking is present and cancellation is disabled
    #[error("an existing booking exists and cancellation is disabled")]
    ExistingBookingKept,
}

impl FatalError {
    /// Process exit code for this condition. Deliberate stops exit 0,
    /// everything else exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoLocationInRange { .. } => 0,
            _ => 1,
        }
    }
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    /// Terminal condition, see [`FatalError`]
    #[error(transparent)]
    Fatal(#[from] FatalError),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors (selection cache, config file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error must terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::Config(_))
    }

    /// Exit code the binary should use for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Fatal(f) => f.exit_code(),
            _ => 1,
        }
    }
}

/// Result type alias using the crate-wide [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
