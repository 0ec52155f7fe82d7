//! Slot matching against user preferences
//!
//! Pure filtering over the availability snapshot one location reported.
//! Selection keeps the server's ordering: the first surviving day wins, and
//! within it the first surviving slot. No ranking beyond that.

use chrono::{Duration, NaiveDate, Weekday};

use crate::config::SlotPreferences;
use crate::error::{Error, Result};
use crate::models::{AvailableDay, TimeSlot};

/// A matching slot, ready to hold
#[derive(Debug, Clone)]
pub struct SlotMatch {
    pub date: NaiveDate,
    pub slot: TimeSlot,
}

/// Resolved matching rules for one run
#[derive(Debug, Clone)]
pub struct SlotFilter {
    /// Accept any date; only the hour window applies
    same_day: bool,

    /// Inclusive date window (ignored in same-day mode)
    window_start: NaiveDate,
    window_end: NaiveDate,

    /// Acceptable weekdays; empty accepts every day
    weekdays: Vec<Weekday>,

    /// Slot start hour window, start inclusive, end exclusive
    earliest_hour: u32,
    latest_hour: u32,
}

impl SlotFilter {
    /// Resolve preferences against an anchor date (normally today).
    ///
    /// # Errors
    ///
    /// Returns a config error when the weekday names cannot be parsed.
    pub fn from_preferences(prefs: &SlotPreferences, today: NaiveDate) -> Result<Self> {
        let anchor = prefs.start_date.unwrap_or(today);

        Ok(Self {
            same_day: prefs.same_day,
            window_start: anchor + Duration::days(prefs.days_around_start),
            window_end: anchor + Duration::days(prefs.days_around_end),
            weekdays: prefs.weekdays().map_err(|e| Error::config(e.to_string()))?,
            earliest_hour: prefs.earliest_hour,
            latest_hour: prefs.latest_hour,
        })
    }

    /// First slot surviving all filters, or `None` when nothing matches
    /// this cycle (a soft rejection, never an error).
    pub fn first_match(&self, days: &[AvailableDay]) -> Option<SlotMatch> {
        days.iter()
            .filter(|day| self.day_matches(day))
            .find_map(|day| {
                day.slots
                    .iter()
                    .find(|slot| self.hour_matches(slot))
                    .map(|slot| SlotMatch {
                        date: day.date,
                        slot: slot.clone(),
                    })
            })
    }

    fn day_matches(&self, day: &AvailableDay) -> bool {
        if self.same_day {
            return true;
        }
        if day.date < self.window_start || day.date > self.window_end {
            return false;
        }
        self.weekdays.is_empty() || self.weekdays.contains(&day.weekday())
    }

    fn hour_matches(&self, slot: &TimeSlot) -> bool {
        let hour = slot.start_hour();
        hour >= self.earliest_hour && hour < self.latest_hour
    }
}
