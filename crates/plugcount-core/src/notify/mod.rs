//! Run summaries and their delivery.
//!
//! A run produces one [`SummaryMessage`] and hands it to a [`Notifier`] at
//! most once. Delivery failures are returned to the caller, which logs them;
//! nothing here retries.

pub mod message;
pub mod webhook;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::PlugcountError;
use crate::types::{DeltaReport, SkippedRepository};

pub use message::SummaryMessage;
pub use webhook::{WebhookFormat, WebhookNotifier};

/// Trait for outbound notification channels.
pub trait Notifier: Send + Sync {
    /// Deliver `message`. One attempt, no retry.
    fn send(&self, message: &SummaryMessage) -> Result<(), PlugcountError>;

    /// Channel name for logs (e.g., "feishu").
    fn name(&self) -> &str;
}

/// When a run should notify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyOn {
    /// Every run that reaches the notify stage.
    #[default]
    Always,
    /// Only when some count moved, a baseline is missing, or a repository
    /// was skipped.
    Change,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifySettings {
    pub notify_on: NotifyOn,
    /// Target total, reported as "needed to reach N".
    pub milestone: Option<u64>,
}

impl NotifySettings {
    pub fn should_notify(&self, reports: &[DeltaReport], skipped: &[SkippedRepository]) -> bool {
        match self.notify_on {
            NotifyOn::Always => true,
            NotifyOn::Change => {
                !skipped.is_empty() || reports.iter().any(|r| r.delta != Some(0))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mock (for testing)
// ---------------------------------------------------------------------------

/// A notifier that records messages in memory and optionally fails.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<SummaryMessage>>,
    failure: Option<String>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    /// Messages delivered so far.
    pub fn messages(&self) -> Vec<SummaryMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Notifier for MockNotifier {
    fn send(&self, message: &SummaryMessage) -> Result<(), PlugcountError> {
        if let Some(reason) = &self.failure {
            return Err(PlugcountError::Delivery(reason.clone()));
        }
        self.sent
            .lock()
            .map_err(|_| PlugcountError::Delivery("mock notifier poisoned".into()))?
            .push(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
