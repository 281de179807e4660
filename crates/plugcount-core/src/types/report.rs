use chrono::{DateTime, Utc};
use serde::Serialize;

/// The 24h change for one repository, computed fresh on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaReport {
    pub repository_name: String,
    pub current_count: u64,
    pub count_24h_ago: Option<u64>,
    /// `None` when no baseline old enough exists (cold start).
    pub delta: Option<i64>,
    pub baseline_timestamp: Option<DateTime<Utc>>,
}

impl DeltaReport {
    /// A report with no baseline: cold start, or history that could not be
    /// read.
    pub fn unavailable(repository_name: impl Into<String>, current_count: u64) -> Self {
        Self {
            repository_name: repository_name.into(),
            current_count,
            count_24h_ago: None,
            delta: None,
            baseline_timestamp: None,
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.delta.is_some()
    }

    /// Human-readable delta: `+30`, `-2`, `0`, or `unavailable`.
    pub fn delta_label(&self) -> String {
        match self.delta {
            Some(d) if d > 0 => format!("+{d}"),
            Some(d) => d.to_string(),
            None => "unavailable".to_string(),
        }
    }
}

/// The pipeline stage at which a repository dropped out of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Sync,
    Enumerate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Sync => write!(f, "sync"),
            Stage::Enumerate => write!(f, "enumerate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRepository {
    pub repository_name: String,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
    /// Nothing changed and the policy only notifies on change.
    Suppressed,
    /// No webhook configured, or a dry run.
    Disabled,
}

/// Everything a run produced, for the invoker and the CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_timestamp: DateTime<Utc>,
    pub reports: Vec<DeltaReport>,
    pub skipped: Vec<SkippedRepository>,
    /// Repositories whose sample was counted but could not be persisted.
    pub store_failures: Vec<String>,
    pub delivery: DeliveryStatus,
    /// The rendered summary, whether or not it was delivered.
    pub summary: String,
}

impl RunOutcome {
    /// True when at least one repository was both enumerated and persisted.
    pub fn is_success(&self) -> bool {
        self.reports
            .iter()
            .any(|r| !self.store_failures.contains(&r.repository_name))
    }
}
