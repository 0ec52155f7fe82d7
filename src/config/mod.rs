//! Configuration management for the yeyak engine
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variable overrides. `validate()` runs before the engine
//! starts; the engine itself never re-checks configuration.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Remote API tuning
    pub api: ApiConfig,

    /// Identity submitted with hold/book requests
    pub identity: IdentityConfig,

    /// Location discovery and selection
    pub locations: LocationConfig,

    /// Slot matching preferences
    pub preferences: SlotPreferences,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the scheduling service (required)
    pub base_url: String,

    /// Value for the Origin header; falls back to `base_url` when empty
    pub origin: String,

    /// Retry cap for generic (non-401, non-403) failures
    pub max_retries: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Outbound request pacing (requests per second)
    pub rate_limit: f64,

    /// Backoff after a 403 rate-limit response, in seconds
    pub rate_limit_backoff_secs: u64,

    /// Job driver tick interval in seconds
    pub check_interval_secs: u64,

    /// Sleep between poll cycles in seconds
    pub poll_interval_secs: u64,

    /// Stagger before each per-location availability check, in seconds
    pub stagger_secs: u64,

    /// Pause after a location query returns nothing, in seconds
    pub empty_result_pause_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            origin: String::new(),
            max_retries: 5,
            request_timeout_secs: 30,
            rate_limit: 1.0,
            rate_limit_backoff_secs: 10,
            check_interval_secs: 60,
            poll_interval_secs: 30,
            stagger_secs: 5,
            empty_result_pause_secs: 2,
        }
    }
}

/// Identity fields sent to the scheduling service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub ssn_last4: String,
}

impl IdentityConfig {
    /// Username derived from the name fields, used for the auth exchange
    pub fn username(&self) -> String {
        format!("{}{}", self.first_name, self.last_name)
    }
}

/// Location discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Zip codes to query for candidate locations
    pub zip_codes: Vec<String>,

    /// City to query instead of zip codes
    pub city: Option<String>,

    /// Service type id forwarded to every location query
    pub service_type_id: u32,

    /// Interactive selection instead of the distance filter
    pub manual_selection: bool,

    /// Maximum distance in miles for automatic selection
    pub max_distance_miles: f64,

    /// Persisted manual selection (skips re-prompting)
    pub selection_cache_path: PathBuf,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            zip_codes: Vec::new(),
            city: None,
            service_type_id: 71,
            manual_selection: false,
            max_distance_miles: 25.0,
            selection_cache_path: PathBuf::from("data/locations.json"),
        }
    }
}

/// Slot matching preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotPreferences {
    /// Accept any date with open slots, ignoring window and weekday filters
    pub same_day: bool,

    /// Anchor date for the window filter; today when absent
    pub start_date: Option<NaiveDate>,

    /// Window start as days from the anchor date (inclusive)
    pub days_around_start: i64,

    /// Window end as days from the anchor date (inclusive)
    pub days_around_end: i64,

    /// Acceptable weekdays ("monday".."sunday"); empty accepts any day
    pub preferred_weekdays: Vec<String>,

    /// Earliest acceptable slot start hour (inclusive)
    pub earliest_hour: u32,

    /// Latest acceptable slot start hour (exclusive)
    pub latest_hour: u32,

    /// Cancel an existing booking before booking a new slot
    pub cancel_existing: bool,
}

impl Default for SlotPreferences {
    fn default() -> Self {
        Self {
            same_day: false,
            start_date: None,
            days_around_start: 0,
            days_around_end: 7,
            preferred_weekdays: Vec::new(),
            earliest_hour: 0,
            latest_hour: 24,
            cancel_existing: false,
        }
    }
}

impl SlotPreferences {
    /// Parse the configured weekday names
    pub fn weekdays(&self) -> Result<Vec<Weekday>> {
        self.preferred_weekdays
            .iter()
            .map(|name| parse_weekday(name))
            .collect()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("YEYAK_BASE_URL") {
            self.api.base_url = url;
        }
        if let Ok(origin) = std::env::var("YEYAK_ORIGIN") {
            self.api.origin = origin;
        }
        if let Some(retries) = env_parse::<u32>("YEYAK_MAX_RETRIES") {
            self.api.max_retries = retries;
        }
        if let Some(secs) = env_parse::<u64>("YEYAK_REQUEST_TIMEOUT") {
            self.api.request_timeout_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("YEYAK_POLL_INTERVAL") {
            self.api.poll_interval_secs = secs;
        }
        if let Ok(zips) = std::env::var("YEYAK_ZIP_CODES") {
            self.locations.zip_codes = zips
                .split(',')
                .map(|z| z.trim().to_string())
                .filter(|z| !z.is_empty())
                .collect();
        }
        if let Ok(city) = std::env::var("YEYAK_CITY") {
            self.locations.city = Some(city);
        }
        if let Ok(level) = std::env::var("YEYAK_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            anyhow::bail!("api.base_url is required");
        }
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;

        if self.api.rate_limit <= 0.0 {
            anyhow::bail!("api.rate_limit must be positive");
        }

        if self.locations.zip_codes.is_empty() && self.locations.city.is_none() {
            anyhow::bail!("either locations.zip_codes or locations.city must be set");
        }

        if self.locations.max_distance_miles <= 0.0 {
            anyhow::bail!("locations.max_distance_miles must be positive");
        }

        if self.preferences.earliest_hour >= self.preferences.latest_hour {
            anyhow::bail!("preferences.earliest_hour must be before latest_hour");
        }
        if self.preferences.latest_hour > 24 {
            anyhow::bail!("preferences.latest_hour cannot exceed 24");
        }
        if self.preferences.days_around_start > self.preferences.days_around_end {
            anyhow::bail!("preferences.days_around_start must not exceed days_around_end");
        }
        self.preferences.weekdays()?;

        if self.identity.first_name.is_empty() || self.identity.last_name.is_empty() {
            anyhow::bail!("identity.first_name and identity.last_name are required");
        }

        Ok(())
    }

    /// Origin header value, defaulting to the base URL
    #[must_use]
    pub fn origin(&self) -> &str {
        if self.api.origin.is_empty() {
            &self.api.base_url
        } else {
            &self.api.origin
        }
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    #[must_use]
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.api.rate_limit_backoff_secs)
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.api.check_interval_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.api.poll_interval_secs)
    }

    #[must_use]
    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.api.stagger_secs)
    }

    #[must_use]
    pub fn empty_result_pause(&self) -> Duration {
        Duration::from_secs(self.api.empty_result_pause_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Parse a weekday name, accepting full names and three-letter abbreviations
pub fn parse_weekday(name: &str) -> Result<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        "sunday" | "sun" => Ok(Weekday::Sun),
        other => anyhow::bail!("unknown weekday name: {other}"),
    }
}
