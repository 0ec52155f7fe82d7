//! Candidate location discovery and selection
//!
//! One query per configured zip code (or a single city query) produces the
//! candidate pool; candidates are deduplicated by id and sorted by distance.
//! Selection then runs in one of two modes:
//!
//! - automatic: keep everything within the configured distance
//! - manual: replay a persisted choice, or prompt the operator once

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{ApiClient, AVAILABLE_LOCATIONS};
use crate::config::Config;
use crate::error::{FatalError, Result};
use crate::models::{Location, LocationSource};

pub mod cache;
pub mod prompt;

pub use cache::SelectionCache;
pub use prompt::{LocationPrompt, TerminalPrompt};

/// Query body for the available-locations endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationQuery<'a> {
    type_id: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    zip_code: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    city_name: Option<&'a str>,
}

/// One location as returned by the service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationRecord {
    id: u32,
    name: String,
    address: String,
    distance: f64,
}

/// Resolves and selects the locations one run will poll
pub struct LocationResolver {
    client: Arc<ApiClient>,
    config: Config,
}

impl LocationResolver {
    pub fn new(client: Arc<ApiClient>, config: Config) -> Self {
        Self { client, config }
    }

    /// Query every configured input, deduplicate by id (first occurrence
    /// wins) and sort ascending by distance.
    pub async fn resolve_all(&self) -> Result<Vec<Location>> {
        let mut all = Vec::new();

        if let Some(city) = &self.config.locations.city {
            let source = LocationSource::City(city.clone());
            all.extend(self.query_one(&source).await?);
        } else {
            for zip in &self.config.locations.zip_codes {
                let source = LocationSource::Zip(zip.clone());
                all.extend(self.query_one(&source).await?);
            }
        }

        Ok(dedup_and_sort(all))
    }

    /// Pick the location set for one run.
    ///
    /// # Errors
    ///
    /// Manual mode: [`FatalError::EmptySelection`] when the operator selects
    /// nothing. Automatic mode: [`FatalError::NoLocationsFound`] when the
    /// service returned no candidates at all, [`FatalError::NoLocationInRange`]
    /// when candidates exist but every one is beyond the distance limit.
    pub async fn select_for_run(
        &self,
        prompt: &dyn LocationPrompt,
        cache: &SelectionCache,
    ) -> Result<Vec<Location>> {
        if self.config.locations.manual_selection {
            self.select_manual(prompt, cache).await
        } else {
            self.select_automatic().await
        }
    }

    // Manual mode: a persisted selection bypasses resolution entirely
    async fn select_manual(
        &self,
        prompt: &dyn LocationPrompt,
        cache: &SelectionCache,
    ) -> Result<Vec<Location>> {
        if let Some(cached) = cache.load().await {
            info!(count = cached.len(), "using persisted location selection");
            return Ok(cached);
        }

        let resolved = self.resolve_all().await?;
        let chosen = prompt
            .select(&resolved)
            .await
            .map_err(|e| crate::error::Error::config(format!("selection prompt failed: {e}")))?;

        if chosen.is_empty() {
            return Err(FatalError::EmptySelection.into());
        }

        cache.save(&chosen).await?;
        info!(count = chosen.len(), "location selection persisted");
        Ok(chosen)
    }

    // Automatic mode: distance filter over the resolved pool
    async fn select_automatic(&self) -> Result<Vec<Location>> {
        let resolved = self.resolve_all().await?;
        if resolved.is_empty() {
            return Err(FatalError::NoLocationsFound.into());
        }

        let max = self.config.locations.max_distance_miles;
        let within: Vec<Location> = resolved
            .iter()
            .filter(|l| l.distance <= max)
            .cloned()
            .collect();

        if within.is_empty() {
            // resolved is sorted ascending, so the head is the nearest
            return Err(FatalError::NoLocationInRange {
                nearest: resolved[0].distance,
                max,
            }
            .into());
        }

        info!(
            total = resolved.len(),
            within = within.len(),
            max_miles = max,
            "locations selected by distance"
        );
        Ok(within)
    }

    // One query, tagged with its originating zip/city. An empty result is
    // soft: log, pause briefly, contribute zero locations.
    async fn query_one(&self, source: &LocationSource) -> Result<Vec<Location>> {
        let (zip_code, city_name) = match source {
            LocationSource::Zip(zip) => (Some(zip.as_str()), None),
            LocationSource::City(city) => (None, Some(city.as_str())),
        };

        let query = LocationQuery {
            type_id: self.config.locations.service_type_id,
            zip_code,
            city_name,
        };

        let records: Vec<LocationRecord> =
            self.client.call_json(AVAILABLE_LOCATIONS, &query).await?;

        if records.is_empty() {
            warn!(%source, "no locations returned");
            tokio::time::sleep(self.config.empty_result_pause()).await;
            return Ok(Vec::new());
        }

        let type_id = self.config.locations.service_type_id;
        Ok(records
            .into_iter()
            .map(|r| Location {
                id: r.id,
                name: r.name,
                address: r.address,
                distance: r.distance,
                source: source.clone(),
                type_id,
            })
            .collect())
    }
}

/// Deduplicate by location id (first occurrence wins), then sort ascending
/// by distance.
pub fn dedup_and_sort(locations: Vec<Location>) -> Vec<Location> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Location> = locations
        .into_iter()
        .filter(|l| seen.insert(l.id))
        .collect();

    unique.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: u32, distance: f64, zip: &str) -> Location {
        Location {
            id,
            name: format!("Office {id}"),
            address: "1 Test St".to_string(),
            distance,
            source: LocationSource::Zip(zip.to_string()),
            type_id: 71,
        }
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let merged = dedup_and_sort(vec![
            location(42, 10.0, "78701"),
            location(7, 2.0, "78701"),
            location(42, 1.0, "78702"),
        ]);

        assert_eq!(merged.len(), 2);
        let kept = merged.iter().find(|l| l.id == 42).unwrap();
        // The first-seen record (distance 10.0, zip 78701) is retained
        assert_eq!(kept.distance, 10.0);
        assert_eq!(kept.source, LocationSource::Zip("78701".to_string()));
    }

    #[test]
    fn test_sort_ascending_by_distance() {
        let merged = dedup_and_sort(vec![
            location(1, 9.0, "78701"),
            location(2, 0.5, "78701"),
            location(3, 4.2, "78701"),
        ]);

        let distances: Vec<f64> = merged.iter().map(|l| l.distance).collect();
        assert_eq!(distances, vec![0.5, 4.2, 9.0]);
    }

    #[test]
    fn test_location_query_serializes_one_input() {
        let query = LocationQuery {
            type_id: 71,
            zip_code: Some("78701"),
            city_name: None,
        };
        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains("\"zipCode\":\"78701\""));
        assert!(!json.contains("cityName"));
    }
}
