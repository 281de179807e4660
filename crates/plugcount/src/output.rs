use colored::*;
use plugcount_core::pipeline::CountResult;
use plugcount_core::{CountSample, DeliveryStatus, RunOutcome};
use serde::Serialize;

/// Output mode for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
    Quiet,
}

/// Accumulated JSON result entry.
#[derive(Debug, Serialize, Clone)]
pub struct JsonResultEntry {
    #[serde(rename = "type")]
    pub result_type: String,
    pub message: String,
}

/// Accumulated JSON output.
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub results: Vec<JsonResultEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Reporter handles all user-facing output. Diagnostics go through
/// `tracing`; this is only what the command produces.
pub struct Reporter {
    mode: OutputMode,
    json_results: Vec<JsonResultEntry>,
    data: Option<serde_json::Value>,
}

impl Reporter {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            json_results: Vec::new(),
            data: None,
        }
    }

    fn push(&mut self, result_type: &str, message: &str) {
        self.json_results.push(JsonResultEntry {
            result_type: result_type.to_string(),
            message: message.to_string(),
        });
    }

    pub fn error(&mut self, message: &str) {
        match self.mode {
            OutputMode::Json => self.push("error", message),
            OutputMode::Human | OutputMode::Quiet => {
                eprintln!("{} {}", "ERROR:".red(), message);
            }
        }
    }

    pub fn warning(&mut self, message: &str) {
        match self.mode {
            OutputMode::Human => eprintln!("{} {}", "WARNING:".yellow(), message),
            OutputMode::Json => self.push("warning", message),
            OutputMode::Quiet => {}
        }
    }

    pub fn success(&mut self, message: &str) {
        match self.mode {
            OutputMode::Human => println!("{} {}", "✓".green(), message),
            OutputMode::Json => self.push("success", message),
            OutputMode::Quiet => {}
        }
    }

    pub fn info(&mut self, message: &str) {
        match self.mode {
            OutputMode::Human => println!("{} {}", "INFO:".blue(), message),
            OutputMode::Json => self.push("info", message),
            OutputMode::Quiet => {}
        }
    }

    pub fn section(&mut self, title: &str) {
        if self.mode == OutputMode::Human {
            println!("{}", format!("=== {title} ===").cyan());
        }
    }

    /// Prints raw text in human mode only (summaries, config dumps).
    pub fn text(&mut self, text: &str) {
        if self.mode == OutputMode::Human {
            println!("{text}");
        }
    }

    /// Attaches a structured payload to the JSON output.
    pub fn data<T: Serialize>(&mut self, value: &T) {
        if self.mode == OutputMode::Json {
            self.data = serde_json::to_value(value).ok();
        }
    }

    pub fn report_outcome(&mut self, outcome: &RunOutcome) {
        self.data(outcome);

        self.section("Plugin counts");
        for report in &outcome.reports {
            let line = format!(
                "{}: {} (24h: {})",
                report.repository_name,
                report.current_count,
                report.delta_label()
            );
            if outcome.store_failures.contains(&report.repository_name) {
                self.error(&format!("{line}, not recorded"));
            } else {
                self.success(&line);
            }
        }
        for skipped in &outcome.skipped {
            self.warning(&format!(
                "{} skipped at {}: {}",
                skipped.repository_name, skipped.stage, skipped.reason
            ));
        }

        match &outcome.delivery {
            DeliveryStatus::Delivered => self.success("Notification sent"),
            DeliveryStatus::Failed(reason) => {
                self.warning(&format!("Notification not delivered: {reason}"))
            }
            DeliveryStatus::Suppressed => self.info("No change, notification suppressed"),
            DeliveryStatus::Disabled => {}
        }

        if outcome.is_success() {
            self.success(&format!(
                "Run complete: {} counted, {} skipped",
                outcome.reports.len(),
                outcome.skipped.len()
            ));
        } else {
            self.error("Run failed: no repository was counted and recorded");
        }
    }

    pub fn report_counts(&mut self, results: &[CountResult]) {
        #[derive(Serialize)]
        struct CountEntry<'a> {
            repository_name: &'a str,
            count: Option<u64>,
            error: Option<String>,
        }

        let entries: Vec<CountEntry<'_>> = results
            .iter()
            .map(|r| CountEntry {
                repository_name: &r.repository_name,
                count: r.count.as_ref().ok().copied(),
                error: r.count.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        self.data(&entries);

        for result in results {
            match &result.count {
                Ok(count) => self.success(&format!("{}: {count}", result.repository_name)),
                Err(e) => self.error(&format!("{}: {e}", result.repository_name)),
            }
        }
    }

    pub fn report_history(&mut self, samples: &[CountSample]) {
        self.data(&samples);

        if samples.is_empty() {
            self.info("No samples recorded yet.");
            return;
        }
        for sample in samples {
            self.text(&format!(
                "{}  {:<12} {}",
                sample.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
                sample.repository_name,
                sample.count
            ));
        }
    }

    pub fn finish(&self) {
        if self.mode == OutputMode::Json {
            let output = JsonOutput {
                results: self.json_results.clone(),
                data: self.data.clone(),
            };
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                println!("{json}");
            }
        }
    }
}
