//! The hold-then-book transaction
//!
//! Entered when a location task finds a matching slot. Two latches guard the
//! run: `hold_acquired` and `booking_completed` each transition false to true
//! at most once. The only permitted reset is `hold_acquired` back to false
//! when a booking attempt fails, so a later hold from another location can
//! still proceed. The whole sequence runs under a transaction mutex, keeping
//! the check-and-set atomic even if the queue is ever widened beyond one
//! in-flight task.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, CANCEL_BOOKING, ELIGIBILITY, HOLD_SLOT, NEW_BOOKING};
use crate::config::IdentityConfig;
use crate::error::{FatalError, Result};
use crate::models::{ExistingBooking, Location, TimeSlot};

use super::queue::TaskQueue;

/// Per-run latch state
pub struct RunState {
    hold_acquired: AtomicBool,
    booking_completed: AtomicBool,
    transaction: Mutex<()>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            hold_acquired: AtomicBool::new(false),
            booking_completed: AtomicBool::new(false),
            transaction: Mutex::new(()),
        }
    }

    pub fn hold_acquired(&self) -> bool {
        self.hold_acquired.load(Ordering::SeqCst)
    }

    pub fn booking_completed(&self) -> bool {
        self.booking_completed.load(Ordering::SeqCst)
    }

    fn set_hold(&self) {
        self.hold_acquired.store(true, Ordering::SeqCst);
    }

    // The one permitted reset: a failed booking releases the hold latch
    fn clear_hold(&self) {
        self.hold_acquired.store(false, Ordering::SeqCst);
    }

    fn set_booked(&self) {
        self.booking_completed.store(true, Ordering::SeqCst);
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Successful terminal outcome of a run
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub confirmation_number: String,
    pub location_name: String,
    pub slot: TimeSlot,
    pub confirmation_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HoldRequest<'a> {
    slot_id: i64,
    first_name: &'a str,
    last_name: &'a str,
    date_of_birth: Option<NaiveDate>,
    last_four_ssn: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoldResponse {
    slot_held: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityRequest<'a> {
    first_name: &'a str,
    last_name: &'a str,
    date_of_birth: Option<NaiveDate>,
    last_four_ssn: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityRecord {
    response_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest<'a> {
    confirmation_number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingRequest<'a> {
    response_id: i64,
    slot_id: i64,
    location_id: u32,
    service_type_id: u32,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    cell_phone: &'a str,
    date_of_birth: Option<NaiveDate>,
    last_four_ssn: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingResponse {
    booking: Option<BookedRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookedRecord {
    confirmation_number: String,
}

/// Executes the hold-then-book sequence for matched slots
pub struct BookingTransaction {
    client: Arc<ApiClient>,
    state: Arc<RunState>,
    queue: TaskQueue,
    identity: IdentityConfig,
    existing: ExistingBooking,
    cancel_existing: bool,
}

impl BookingTransaction {
    pub fn new(
        client: Arc<ApiClient>,
        state: Arc<RunState>,
        queue: TaskQueue,
        identity: IdentityConfig,
        existing: ExistingBooking,
        cancel_existing: bool,
    ) -> Self {
        Self {
            client,
            state,
            queue,
            identity,
            existing,
            cancel_existing,
        }
    }

    /// Latch state, exposed for the poller and for tests
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Attempt to hold and book `slot` at `location`.
    ///
    /// Returns `Ok(Some(..))` exactly once per run on success. `Ok(None)`
    /// covers every non-terminal outcome: latch no-op, hold rejected,
    /// booking rejected. Only unrecoverable conditions surface as `Err`.
    pub async fn attempt(
        &self,
        location: &Location,
        slot: &TimeSlot,
    ) -> Result<Option<BookingConfirmation>> {
        let _guard = self.state.transaction.lock().await;

        if self.state.hold_acquired() {
            debug!(
                location = %location.name,
                "hold already acquired by another slot, skipping"
            );
            return Ok(None);
        }

        if !self.hold(location, slot).await? {
            self.queue.resume();
            return Ok(None);
        }
        self.state.set_hold();
        info!(location = %location.name, slot_id = slot.slot_id, "slot held");

        self.book(location, slot).await
    }

    // Phase 1: hold the slot. Returns whether the service granted the hold.
    async fn hold(&self, location: &Location, slot: &TimeSlot) -> Result<bool> {
        let request = HoldRequest {
            slot_id: slot.slot_id,
            first_name: &self.identity.first_name,
            last_name: &self.identity.last_name,
            date_of_birth: self.identity.date_of_birth,
            last_four_ssn: &self.identity.ssn_last4,
        };

        let response: HoldResponse = self.client.call_json(HOLD_SLOT, &request).await?;
        if !response.slot_held {
            warn!(
                location = %location.name,
                slot_id = slot.slot_id,
                "hold rejected, resuming polling"
            );
        }
        Ok(response.slot_held)
    }

    // Phase 2: cancel any existing booking, then submit the new one
    async fn book(
        &self,
        location: &Location,
        slot: &TimeSlot,
    ) -> Result<Option<BookingConfirmation>> {
        if self.state.booking_completed() {
            return Ok(None);
        }

        if self.existing.exists {
            if !self.cancel_existing {
                return Err(FatalError::ExistingBookingKept.into());
            }
            self.cancel_existing_booking().await;
        }

        let response_id = match self.eligibility_response_id().await? {
            Some(id) => id,
            None => {
                warn!("eligibility check returned no response id");
                return self.fail_booking();
            }
        };

        let request = BookingRequest {
            response_id,
            slot_id: slot.slot_id,
            location_id: location.id,
            service_type_id: location.type_id,
            first_name: &self.identity.first_name,
            last_name: &self.identity.last_name,
            email: &self.identity.email,
            cell_phone: &self.identity.phone,
            date_of_birth: self.identity.date_of_birth,
            last_four_ssn: &self.identity.ssn_last4,
        };

        let response: BookingResponse = self.client.call_json(NEW_BOOKING, &request).await?;
        match response.booking {
            Some(booked) => {
                self.state.set_booked();
                let confirmation_url = format!(
                    "{}/booking/confirmation/{}",
                    self.client.base_url(),
                    booked.confirmation_number
                );
                info!(
                    confirmation = %booked.confirmation_number,
                    location = %location.name,
                    start = %slot.start,
                    url = %confirmation_url,
                    "appointment booked"
                );
                Ok(Some(BookingConfirmation {
                    confirmation_number: booked.confirmation_number,
                    location_name: location.name.clone(),
                    slot: slot.clone(),
                    confirmation_url,
                }))
            }
            None => {
                warn!(location = %location.name, "booking rejected by the service");
                self.fail_booking()
            }
        }
    }

    // Booking failed after a successful hold: resume polling and release the
    // hold latch so a later match can try again.
    fn fail_booking(&self) -> Result<Option<BookingConfirmation>> {
        self.queue.resume();
        self.state.clear_hold();
        Ok(None)
    }

    // Best-effort cancel of the run-start booking snapshot
    async fn cancel_existing_booking(&self) {
        let Some(confirmation_number) = self.existing.confirmation_number.as_deref() else {
            return;
        };

        let request = CancelRequest {
            confirmation_number,
        };
        match self.client.call(CANCEL_BOOKING, &request).await {
            Ok(_) => info!(confirmation = confirmation_number, "existing booking cancelled"),
            Err(e) => warn!(
                confirmation = confirmation_number,
                error = %e,
                "failed to cancel existing booking, continuing"
            ),
        }
    }

    async fn eligibility_response_id(&self) -> Result<Option<i64>> {
        let request = EligibilityRequest {
            first_name: &self.identity.first_name,
            last_name: &self.identity.last_name,
            date_of_birth: self.identity.date_of_birth,
            last_four_ssn: &self.identity.ssn_last4,
        };

        let records: Vec<EligibilityRecord> =
            self.client.call_json(ELIGIBILITY, &request).await?;
        Ok(records.first().map(|r| r.response_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latches_start_clear() {
        let state = RunState::new();
        assert!(!state.hold_acquired());
        assert!(!state.booking_completed());
    }

    #[test]
    fn test_hold_latch_set_and_permitted_reset() {
        let state = RunState::new();
        state.set_hold();
        assert!(state.hold_acquired());

        state.clear_hold();
        assert!(!state.hold_acquired());
    }

    #[test]
    fn test_booking_latch_is_one_way() {
        let state = RunState::new();
        state.set_booked();
        assert!(state.booking_completed());
        // No API exists to clear the booking latch
    }
}
