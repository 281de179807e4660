//! Handler for `plugcount run`, the default command.

use chrono::Utc;
use plugcount_core::notify::{Notifier, WebhookNotifier};
use plugcount_core::pipeline::{self, RunContext};
use plugcount_core::{Config, HistoryStore};
use tracing::{error, info};

use crate::output::Reporter;

/// Runs one full sync, count, record and notify cycle.
///
/// Returns `true` when at least one repository was counted and recorded.
pub fn run_pipeline(
    config: &Config,
    dry_run: bool,
    skip_sync: bool,
    reporter: &mut Reporter,
) -> bool {
    let repositories = match config.tracked_repositories() {
        Ok(r) => r,
        Err(e) => {
            reporter.error(&format!("Invalid configuration: {e}"));
            return false;
        }
    };

    // Without history the run still counts and notifies; nothing is recorded.
    let mut store = match HistoryStore::open(&config.data_dir) {
        Ok(s) => {
            info!(path = %s.path().display(), samples = s.len(), "history opened");
            Some(s)
        }
        Err(e) => {
            error!(error = %e, "cannot open history store");
            reporter.error(&format!("Cannot open history: {e}"));
            None
        }
    };

    let notifier = match &config.webhook_url {
        Some(url) => {
            match WebhookNotifier::new(url, config.webhook_format, config.webhook_timeout()) {
                Ok(n) => Some(n),
                Err(e) => {
                    reporter.warning(&format!("Webhook disabled: {e}"));
                    None
                }
            }
        }
        None => None,
    };

    let sync = super::repository_sync(config, skip_sync);
    let ctx = RunContext {
        repositories: &repositories,
        sync: sync.as_ref(),
        notifier: notifier.as_ref().map(|n| n as &dyn Notifier),
        settings: config.notify_settings(),
        dry_run,
    };

    let outcome = pipeline::run(&ctx, store.as_mut(), Utc::now());

    if let Some(Err(e)) = store.map(HistoryStore::close) {
        error!(error = %e, "history store did not close cleanly");
        reporter.warning(&format!("History store did not close cleanly: {e}"));
    }

    if dry_run {
        reporter.section("Summary (dry run, not recorded or sent)");
        reporter.text(&outcome.summary);
    }
    reporter.report_outcome(&outcome);
    outcome.is_success()
}
