//! The appointment acquisition engine
//!
//! One run is: refresh the session token, snapshot any existing booking,
//! resolve and select locations, then poll until a slot is held and booked
//! or a fatal condition ends the process.
//!
//! # Modules
//!
//! - [`availability`] - slot filtering against user preferences
//! - [`queue`] - serialized task dispatch with pause/resume
//! - [`booking`] - the hold-then-book transaction and its latches
//! - [`poller`] - the per-cycle fan-out over locations

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::captcha::CaptchaTokenProvider;
use crate::client::{ApiClient, BOOKING};
use crate::config::Config;
use crate::error::Result;
use crate::locations::{LocationPrompt, LocationResolver, SelectionCache};
use crate::models::{BookingRecord, ExistingBooking, Location};

pub mod availability;
pub mod booking;
pub mod poller;
pub mod queue;

pub use availability::{SlotFilter, SlotMatch};
pub use booking::{BookingConfirmation, BookingTransaction, RunState};
pub use poller::Poller;
pub use queue::{TaskOutcome, TaskQueue};

/// Identity payload for the existing-booking lookup
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingLookupRequest<'a> {
    first_name: &'a str,
    last_name: &'a str,
    date_of_birth: Option<NaiveDate>,
    last_four_ssn: &'a str,
}

/// The engine: owns the API client and drives complete runs
pub struct Engine {
    client: Arc<ApiClient>,
    config: Config,
    prompt: Arc<dyn LocationPrompt>,
}

impl Engine {
    /// Build an engine from validated configuration.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(
        config: Config,
        captcha: Arc<dyn CaptchaTokenProvider>,
        prompt: Arc<dyn LocationPrompt>,
    ) -> Result<Self> {
        let client = Arc::new(ApiClient::new(&config, captcha)?);
        Ok(Self {
            client,
            config,
            prompt,
        })
    }

    /// Execute one complete run. Returns only on success; every other end
    /// is a fatal error for the driver to act on.
    pub async fn run(&self) -> Result<BookingConfirmation> {
        self.client.authenticate().await?;

        let existing = self.existing_booking().await?;
        if existing.exists {
            info!(
                confirmation = existing.confirmation_number.as_deref().unwrap_or("-"),
                site = existing.site_name.as_deref().unwrap_or("-"),
                "existing booking on file"
            );
        }

        let resolver = LocationResolver::new(self.client.clone(), self.config.clone());
        let cache = SelectionCache::new(self.config.locations.selection_cache_path.clone());
        let locations = resolver
            .select_for_run(self.prompt.as_ref(), &cache)
            .await?;
        info!(count = locations.len(), "polling locations selected");

        let filter = SlotFilter::from_preferences(
            &self.config.preferences,
            Local::now().date_naive(),
        )?;

        let queue = TaskQueue::new();
        let state = Arc::new(RunState::new());
        let transaction = BookingTransaction::new(
            self.client.clone(),
            state,
            queue.clone(),
            self.config.identity.clone(),
            existing,
            self.config.preferences.cancel_existing,
        );

        let poller = Poller::new(
            self.client.clone(),
            queue,
            transaction,
            filter,
            locations,
            self.config.preferences.same_day,
            self.config.stagger(),
            self.config.poll_interval(),
        );

        poller.run().await
    }

    /// Resolve candidate locations without starting the engine (CLI listing)
    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        self.client.authenticate().await?;
        let resolver = LocationResolver::new(self.client.clone(), self.config.clone());
        resolver.resolve_all().await
    }

    // Snapshot the identity's existing booking, once per run
    async fn existing_booking(&self) -> Result<ExistingBooking> {
        let request = BookingLookupRequest {
            first_name: &self.config.identity.first_name,
            last_name: &self.config.identity.last_name,
            date_of_birth: self.config.identity.date_of_birth,
            last_four_ssn: &self.config.identity.ssn_last4,
        };

        let records: Vec<BookingRecord> = self.client.call_json(BOOKING, &request).await?;
        Ok(ExistingBooking::from_records(records))
    }
}
