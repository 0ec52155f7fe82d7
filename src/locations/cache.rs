//! Persisted manual location selection
//!
//! Manual mode asks the operator to choose locations once and replays that
//! choice on later runs. The selection is a small JSON file written with an
//! atomic temp-file rename.

use std::path::PathBuf;
use tracing::warn;

use crate::error::Result;
use crate::models::Location;

/// File-backed store for the chosen-location list
pub struct SelectionCache {
    path: PathBuf,
}

impl SelectionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted selection. Returns `None` when the file does not
    /// exist or cannot be parsed (a corrupt cache is discarded, not fatal).
    pub async fn load(&self) -> Option<Vec<Location>> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;

        match serde_json::from_str::<Vec<Location>>(&content) {
            Ok(locations) if !locations.is_empty() => Some(locations),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "discarding unreadable selection cache"
                );
                None
            }
        }
    }

    /// Persist the selection for future runs
    pub async fn save(&self, locations: &[Location]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(locations)?;
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
