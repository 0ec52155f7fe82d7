//! yeyak - appointment slot watcher and booking engine
//!
//! Polls a remote scheduling service for newly opened appointment slots
//! matching configured date/time preferences and books the first match
//! through an atomic hold-then-book transaction.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`client`] - Scheduling API client with retry, backoff and auth refresh
//! - [`captcha`] - Captcha-token acquisition interface
//! - [`locations`] - Candidate location discovery and selection
//! - [`engine`] - Poll scheduler, slot matching and the booking transaction
//! - [`driver`] - Interval trigger with the single in-flight run guard
//! - [`models`] - Core data structures and types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use yeyak::captcha::PromptTokenProvider;
//! use yeyak::config::Config;
//! use yeyak::engine::Engine;
//! use yeyak::locations::TerminalPrompt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!     let engine = Engine::new(
//!         config,
//!         Arc::new(PromptTokenProvider),
//!         Arc::new(TerminalPrompt),
//!     )?;
//!     // engine.run().await?;
//!     Ok(())
//! }
//! ```

pub mod captcha;
pub mod client;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod locations;
pub mod models;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::ApiClient;
    pub use crate::config::Config;
    pub use crate::driver::RunDriver;
    pub use crate::engine::{BookingConfirmation, Engine, SlotFilter, TaskQueue};
    pub use crate::error::{Error, FatalError, Result};
    pub use crate::models::{AvailableDay, ExistingBooking, Location, TimeSlot};
}

// Direct re-exports for convenience
pub use models::{AvailableDay, ExistingBooking, Location, TimeSlot};
