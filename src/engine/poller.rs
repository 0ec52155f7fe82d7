//! The polling loop
//!
//! Each cycle builds one availability-check task per location, submits the
//! batch to the serialized queue and awaits it, then sleeps the configured
//! interval. Soft failures inside a task (transport hiccups, parse problems,
//! no matching slots) are logged where they happen and never escalate; the
//! loop only ends with a booked slot or a fatal condition.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, AVAILABLE_LOCATION_DATES};
use crate::error::Result;
use crate::models::{AvailableDay, Location};

use super::availability::SlotFilter;
use super::booking::{BookingConfirmation, BookingTransaction};
use super::queue::TaskQueue;

/// Availability query for one location
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityQuery {
    location_id: u32,
    type_id: u32,
    same_day: bool,
}

/// Polls the selected locations until a slot is booked
pub struct Poller {
    client: Arc<ApiClient>,
    queue: TaskQueue,
    transaction: BookingTransaction,
    filter: SlotFilter,
    locations: Vec<Location>,
    same_day: bool,
    stagger: Duration,
    poll_interval: Duration,
}

impl Poller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<ApiClient>,
        queue: TaskQueue,
        transaction: BookingTransaction,
        filter: SlotFilter,
        locations: Vec<Location>,
        same_day: bool,
        stagger: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            queue,
            transaction,
            filter,
            locations,
            same_day,
            stagger,
            poll_interval,
        }
    }

    /// Run poll cycles until a terminal outcome.
    ///
    /// # Errors
    ///
    /// Only fatal conditions: retry exhaustion from the client, auth
    /// failure, or an existing booking that may not be cancelled.
    pub async fn run(&self) -> Result<BookingConfirmation> {
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            debug!(cycle, locations = self.locations.len(), "poll cycle");

            let tasks: Vec<_> = self
                .locations
                .iter()
                .map(|location| self.check_location(location))
                .collect();

            let outcomes = self.queue.run_batch(tasks).await;
            for result in outcomes.into_iter().filter_map(|o| o.completed()) {
                if let Some(confirmation) = result? {
                    return Ok(confirmation);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    // One per-location task: stagger, fetch a fresh snapshot, filter, and on
    // a match pause the queue and enter the booking transaction.
    async fn check_location(&self, location: &Location) -> Result<Option<BookingConfirmation>> {
        tokio::time::sleep(self.stagger).await;

        let days = match self.fetch_availability(location).await {
            Ok(days) => days,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(location = %location.name, error = %e, "availability check failed");
                return Ok(None);
            }
        };

        let Some(found) = self.filter.first_match(&days) else {
            debug!(location = %location.name, "no matching availability");
            return Ok(None);
        };

        info!(
            location = %location.name,
            date = %found.date,
            slot_id = found.slot.slot_id,
            start = %found.slot.start,
            "matching slot found"
        );

        self.queue.pause();
        self.transaction.attempt(location, &found.slot).await
    }

    async fn fetch_availability(&self, location: &Location) -> Result<Vec<AvailableDay>> {
        let query = AvailabilityQuery {
            location_id: location.id,
            type_id: location.type_id,
            same_day: self.same_day,
        };
        self.client.call_json(AVAILABLE_LOCATION_DATES, &query).await
    }
}
