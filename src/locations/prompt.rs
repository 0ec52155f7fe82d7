//! Interactive location selection
//!
//! Manual mode presents the resolved candidates and lets the operator pick a
//! subset. The prompt is a trait so the engine never depends on a terminal.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::models::Location;

/// Multi-select prompt over resolved candidate locations
#[async_trait]
pub trait LocationPrompt: Send + Sync {
    /// Present `candidates` and return the chosen subset (possibly empty)
    async fn select(&self, candidates: &[Location]) -> Result<Vec<Location>>;
}

/// Terminal prompt: numbered list, comma-separated answer
pub struct TerminalPrompt;

#[async_trait]
impl LocationPrompt for TerminalPrompt {
    async fn select(&self, candidates: &[Location]) -> Result<Vec<Location>> {
        println!("Candidate locations:");
        for (index, location) in candidates.iter().enumerate() {
            println!("  [{}] {}", index + 1, location);
        }
        println!("Enter the numbers to watch, comma separated (e.g. 1,3):");

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader
            .read_line(&mut line)
            .await
            .context("Failed to read selection from stdin")?;

        Ok(parse_selection(&line, candidates))
    }
}

/// Parse a comma-separated list of 1-based indices into locations.
/// Out-of-range or unparseable entries are ignored; duplicates collapse.
pub fn parse_selection(input: &str, candidates: &[Location]) -> Vec<Location> {
    let mut seen = std::collections::HashSet::new();
    input
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= candidates.len())
        .filter(|&n| seen.insert(n))
        .map(|n| candidates[n - 1].clone())
        .collect()
}
