// Core data structures for the yeyak booking engine

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Authenticated session state, owned by the auth manager.
///
/// The bearer token is absent at construction, set after the first successful
/// token exchange and overwritten on every refresh.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub bearer_token: Option<String>,
    pub user_agent: String,
    pub captcha_token: Option<String>,
}

impl Session {
    /// Create a fresh session with the process-lifetime user agent
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            bearer_token: None,
            user_agent: user_agent.into(),
            captcha_token: None,
        }
    }
}

/// Where a candidate location came from during resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    Zip(String),
    City(String),
}

impl std::fmt::Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zip(zip) => write!(f, "zip {zip}"),
            Self::City(city) => write!(f, "city {city}"),
        }
    }
}

/// A candidate service location. Immutable once resolved for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: u32,
    pub name: String,
    pub address: String,
    /// Distance from the queried zip/city in miles
    pub distance: f64,
    pub source: LocationSource,
    pub type_id: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.1} mi) - {}",
            self.name, self.distance, self.address
        )
    }
}

/// One bookable slot as reported by the scheduling service.
/// Produced fresh on every poll, never cached across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub slot_id: i64,

    #[serde(rename = "startDateTime")]
    pub start: NaiveDateTime,

    #[serde(rename = "duration")]
    pub duration_minutes: u32,

    #[serde(rename = "formattedStartDateTime", default)]
    pub formatted_start: String,
}

impl TimeSlot {
    /// Hour-of-day of the slot start (0-23)
    pub fn start_hour(&self) -> u32 {
        self.start.hour()
    }
}

/// All open slots for one calendar day at one location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableDay {
    #[serde(rename = "availabilityDate")]
    pub date: NaiveDate,

    #[serde(rename = "timeSlots", default)]
    pub slots: Vec<TimeSlot>,
}

impl AvailableDay {
    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }
}

/// One booking record as returned by the booking-lookup endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub confirmation_number: String,

    pub site_name: String,

    #[serde(rename = "bookingDateTime")]
    pub booking_time: NaiveDateTime,
}

/// Snapshot of the identity's existing booking, taken once at run start.
/// Used only to decide whether to cancel before booking anew.
#[derive(Debug, Clone, Default)]
pub struct ExistingBooking {
    pub exists: bool,
    pub confirmation_number: Option<String>,
    pub site_name: Option<String>,
    pub booking_time: Option<NaiveDateTime>,
}

impl ExistingBooking {
    /// Build the snapshot from the lookup response. The service returns a
    /// list; only the first record matters for a single identity.
    pub fn from_records(records: Vec<BookingRecord>) -> Self {
        match records.into_iter().next() {
            Some(record) => Self {
                exists: true,
                confirmation_number: Some(record.confirmation_number),
                site_name: Some(record.site_name),
                booking_time: Some(record.booking_time),
            },
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_slot_wire_format() {
        let json = r#"{
            "slotId": 91842,
            "startDateTime": "2024-03-05T09:30:00",
            "duration": 20,
            "formattedStartDateTime": "March 5, 2024 9:30 AM"
        }"#;

        let slot: TimeSlot = serde_json::from_str(json).unwrap();
        assert_eq!(slot.slot_id, 91842);
        assert_eq!(slot.start_hour(), 9);
        assert_eq!(slot.duration_minutes, 20);
        assert!(slot.formatted_start.contains("March"));
    }

    #[test]
    fn test_available_day_defaults_empty_slots() {
        let json = r#"{"availabilityDate": "2024-03-05"}"#;
        let day: AvailableDay = serde_json::from_str(json).unwrap();
        assert_eq!(day.weekday(), Weekday::Tue);
        assert!(day.slots.is_empty());
    }

    #[test]
    fn test_existing_booking_from_records() {
        let records = vec![BookingRecord {
            confirmation_number: "A1B2C3".to_string(),
            site_name: "Downtown Office".to_string(),
            booking_time: "2024-04-01T10:00:00".parse().unwrap(),
        }];

        let snapshot = ExistingBooking::from_records(records);
        assert!(snapshot.exists);
        assert_eq!(snapshot.confirmation_number.as_deref(), Some("A1B2C3"));

        let empty = ExistingBooking::from_records(vec![]);
        assert!(!empty.exists);
        assert!(empty.confirmation_number.is_none());
    }

    #[test]
    fn test_location_display() {
        let loc = Location {
            id: 42,
            name: "Eastside Office".to_string(),
            address: "100 Main St".to_string(),
            distance: 3.25,
            source: LocationSource::Zip("78701".to_string()),
            type_id: 71,
        };
        let text = loc.to_string();
        assert!(text.contains("Eastside Office"));
        assert!(text.contains("3.2 mi"));
    }

    #[test]
    fn test_location_roundtrips_through_json() {
        let loc = Location {
            id: 7,
            name: "North Office".to_string(),
            address: "2 Elm Ave".to_string(),
            distance: 11.0,
            source: LocationSource::City("Springfield".to_string()),
            type_id: 71,
        };

        let json = serde_json::to_string(&loc).unwrap();
        let restored: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, 7);
        assert_eq!(restored.source, LocationSource::City("Springfield".into()));
    }
}
