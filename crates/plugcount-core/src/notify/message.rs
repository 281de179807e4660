use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::notify::NotifySettings;
use crate::types::{DeltaReport, SkippedRepository, TrackedRepository};

/// The human-readable summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryMessage {
    pub text: String,
}

impl SummaryMessage {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Renders current counts, 24h deltas and skipped repositories.
    ///
    /// A missing baseline is spelled out as "unavailable" so it can never be
    /// read as zero growth.
    pub fn build(
        reports: &[DeltaReport],
        skipped: &[SkippedRepository],
        repositories: &[TrackedRepository],
        run_timestamp: DateTime<Utc>,
        settings: &NotifySettings,
    ) -> Self {
        let mut lines = vec![
            format!(
                "Plugin Count Update ({})",
                run_timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            String::new(),
        ];

        if reports.is_empty() {
            lines.push("No repositories could be counted this run.".to_string());
        } else {
            let total: u64 = reports.iter().map(|r| r.current_count).sum();
            let partial = if skipped.is_empty() { "" } else { " (partial)" };
            lines.push(format!("Total plugins: {total}{partial}"));
            for report in reports {
                let delta = if report.has_baseline() {
                    report.delta_label()
                } else {
                    "unavailable, no baseline yet".to_string()
                };
                lines.push(format!(
                    "- {}: {} (24h: {delta})",
                    report.repository_name, report.current_count
                ));
            }

            lines.push(String::new());
            let net: Option<i64> = reports.iter().map(|r| r.delta).sum();
            match net {
                Some(n) if n > 0 => lines.push(format!("New plugins (24h): +{n}")),
                Some(n) => lines.push(format!("New plugins (24h): {n}")),
                None => lines.push("New plugins (24h): unavailable".to_string()),
            }

            if let Some(milestone) = settings.milestone {
                lines.push(format!(
                    "Plugins needed to reach {milestone}: {}",
                    milestone.saturating_sub(total)
                ));
            }
        }

        if !skipped.is_empty() {
            lines.push(String::new());
            lines.push("Skipped:".to_string());
            for s in skipped {
                lines.push(format!("- {} ({}): {}", s.repository_name, s.stage, s.reason));
            }
        }

        if !repositories.is_empty() {
            lines.push(String::new());
            lines.push("Repositories:".to_string());
            for repo in repositories {
                lines.push(format!("- {}", repo.remote_url));
            }
        }

        Self {
            text: lines.join("\n"),
        }
    }
}
