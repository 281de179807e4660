//! 24-hour delta computation.

use chrono::{DateTime, Duration, Utc};

use crate::store::HistoryStore;
use crate::types::DeltaReport;

/// Width of the delta window.
pub const DELTA_WINDOW_HOURS: i64 = 24;

/// Computes the change in `current_count` over the last 24 hours.
///
/// The baseline is the latest stored sample taken at or before
/// `now - 24h`. Samples taken inside the window are ignored, so irregular
/// cadence (hourly runs, missed days, manual triggers) always compares
/// against an observation at least a full day old. When no such sample
/// exists the delta is reported as unavailable rather than zero.
///
/// This only reads the store; calling it twice with the same inputs yields
/// the same report.
pub fn compute_delta(
    store: &HistoryStore,
    repository: &str,
    current_count: u64,
    now: DateTime<Utc>,
) -> DeltaReport {
    let boundary = now - Duration::hours(DELTA_WINDOW_HOURS);

    match store.latest_before(repository, boundary) {
        Some(baseline) => DeltaReport {
            repository_name: repository.to_string(),
            current_count,
            count_24h_ago: Some(baseline.count),
            delta: Some(current_count as i64 - baseline.count as i64),
            baseline_timestamp: Some(baseline.timestamp),
        },
        None => DeltaReport::unavailable(repository, current_count),
    }
}
