//! Handler for `plugcount history`.

use chrono::{DateTime, Utc};
use plugcount_core::{Config, HistoryStore};

use crate::output::Reporter;

/// Prints recorded samples, oldest first, optionally filtered by repository
/// and start time and limited to the most recent `limit`.
pub fn run_history(
    config: &Config,
    repository: Option<&str>,
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
    reporter: &mut Reporter,
) -> bool {
    let store = match HistoryStore::open(&config.data_dir) {
        Ok(s) => s,
        Err(e) => {
            reporter.error(&format!("Cannot open history: {e}"));
            return false;
        }
    };

    if let Some(name) = repository {
        let known = store.repositories();
        if !known.iter().any(|r| r == name) && !known.is_empty() {
            reporter.warning(&format!(
                "No history for '{name}'; recorded repositories: {}",
                known.join(", ")
            ));
        }
    }

    let since = since.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut samples: Vec<_> = match repository {
        Some(name) => store.query(name, since),
        None => store
            .all()
            .iter()
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect(),
    };
    if let Some(limit) = limit {
        let excess = samples.len().saturating_sub(limit);
        samples.drain(..excess);
    }

    reporter.report_history(&samples);
    true
}
