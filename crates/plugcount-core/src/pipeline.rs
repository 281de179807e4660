//! One full run: sync, count, compute deltas, persist, notify.
//!
//! Failures are contained per repository. A repository that cannot be synced
//! or counted is reported as skipped and the others carry on. A sample that
//! cannot be persisted is logged as an error but its report still reaches the
//! notifier. Delivery failures never affect the run's success.

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{error, info, info_span, warn};

use crate::delta::compute_delta;
use crate::enumerate::count_repository;
use crate::error::{ErrorKind, PlugcountError};
use crate::notify::{Notifier, NotifySettings, SummaryMessage};
use crate::store::HistoryStore;
use crate::sync::{RepositorySync, SyncAction};
use crate::types::{
    CountSample, DeliveryStatus, DeltaReport, RunOutcome, SkippedRepository, Stage,
    TrackedRepository,
};

/// Collaborators for one run, borrowed from the caller.
pub struct RunContext<'a> {
    pub repositories: &'a [TrackedRepository],
    pub sync: &'a dyn RepositorySync,
    /// `None` when no webhook is configured.
    pub notifier: Option<&'a dyn Notifier>,
    pub settings: NotifySettings,
    /// Compute and render everything but neither persist nor deliver.
    pub dry_run: bool,
}

/// Executes one run at `now`.
///
/// `store` is `None` when the history could not be opened. The run still
/// syncs, counts and notifies, with every delta unavailable and every
/// counted repository recorded as a store failure.
pub fn run(
    ctx: &RunContext<'_>,
    mut store: Option<&mut HistoryStore>,
    now: DateTime<Utc>,
) -> RunOutcome {
    let now = now.trunc_subsecs(0);
    info!(repositories = ctx.repositories.len(), dry_run = ctx.dry_run, "starting run");
    if store.is_none() {
        error!("history store unavailable, this run's counts will not be recorded");
    }

    let mut reports = Vec::new();
    let mut skipped = Vec::new();
    let mut store_failures = Vec::new();

    for repo in ctx.repositories {
        let _span = info_span!("repository", name = %repo.name).entered();

        let count = match sync_and_count(ctx.sync, repo) {
            Ok(count) => count,
            Err(e) => {
                let stage = match e.kind() {
                    ErrorKind::Sync => Stage::Sync,
                    _ => Stage::Enumerate,
                };
                warn!(error = %e, %stage, "skipping repository");
                skipped.push(skip(repo, stage, &e));
                continue;
            }
        };

        // Delta first: the new sample must not become its own baseline.
        let report = match store.as_deref() {
            Some(store) => compute_delta(store, &repo.name, count, now),
            None => DeltaReport::unavailable(&repo.name, count),
        };
        info!(count, delta = %report.delta_label(), "counted plugins");

        if !ctx.dry_run {
            let appended = match store.as_deref_mut() {
                Some(store) => store
                    .append(CountSample::new(&repo.name, now, count))
                    .map(|_| ()),
                None => Err(PlugcountError::Store("history is not open".into())),
            };
            if let Err(e) = appended {
                error!(error = %e, "failed to persist sample, this observation is lost");
                store_failures.push(repo.name.clone());
            }
        }

        reports.push(report);
    }

    let message = SummaryMessage::build(&reports, &skipped, ctx.repositories, now, &ctx.settings);

    let delivery = match ctx.notifier {
        _ if ctx.dry_run => DeliveryStatus::Disabled,
        None => {
            warn!("no webhook configured, not sending notification");
            DeliveryStatus::Disabled
        }
        Some(_) if !ctx.settings.should_notify(&reports, &skipped) => {
            info!("no change since baseline, notification suppressed");
            DeliveryStatus::Suppressed
        }
        Some(notifier) => match notifier.send(&message) {
            Ok(()) => {
                info!(notifier = notifier.name(), "notification sent");
                DeliveryStatus::Delivered
            }
            Err(e) => {
                warn!(notifier = notifier.name(), error = %e, "notification failed");
                DeliveryStatus::Failed(e.to_string())
            }
        },
    };

    let outcome = RunOutcome {
        run_timestamp: now,
        reports,
        skipped,
        store_failures,
        delivery,
        summary: message.text,
    };
    info!(
        counted = outcome.reports.len(),
        skipped = outcome.skipped.len(),
        success = outcome.is_success(),
        "run finished"
    );
    outcome
}

fn sync_and_count(
    sync: &dyn RepositorySync,
    repo: &TrackedRepository,
) -> Result<u64, PlugcountError> {
    let action = sync.sync(repo)?;
    info!(%action, "working copy ready");
    count_repository(repo)
}

fn skip(repo: &TrackedRepository, stage: Stage, err: &PlugcountError) -> SkippedRepository {
    SkippedRepository {
        repository_name: repo.name.clone(),
        stage,
        reason: err.to_string(),
    }
}

/// The outcome of syncing and counting one repository without persisting.
#[derive(Debug)]
pub struct CountResult {
    pub repository_name: String,
    pub action: Option<SyncAction>,
    pub count: Result<u64, PlugcountError>,
}

/// Syncs and counts each repository, touching neither history nor webhook.
pub fn count_only(
    repositories: &[TrackedRepository],
    sync: &dyn RepositorySync,
) -> Vec<CountResult> {
    repositories
        .iter()
        .map(|repo| {
            let _span = info_span!("repository", name = %repo.name).entered();
            match sync.sync(repo) {
                Ok(action) => CountResult {
                    repository_name: repo.name.clone(),
                    action: Some(action),
                    count: count_repository(repo),
                },
                Err(e) => CountResult {
                    repository_name: repo.name.clone(),
                    action: None,
                    count: Err(e),
                },
            }
        })
        .collect()
}
