//! Handler for `plugcount count`.

use plugcount_core::pipeline::count_only;
use plugcount_core::Config;

use crate::output::Reporter;

/// Syncs and counts the named repositories (all when `names` is empty)
/// without recording anything.
///
/// Returns `true` when every selected repository was counted.
pub fn run_count(
    config: &Config,
    names: &[String],
    skip_sync: bool,
    reporter: &mut Reporter,
) -> bool {
    let mut repositories = match config.tracked_repositories() {
        Ok(r) => r,
        Err(e) => {
            reporter.error(&format!("Invalid configuration: {e}"));
            return false;
        }
    };

    if !names.is_empty() {
        if let Some(unknown) = names
            .iter()
            .find(|n| !repositories.iter().any(|r| &r.name == *n))
        {
            reporter.error(&format!("Unknown repository: {unknown}"));
            return false;
        }
        repositories.retain(|r| names.contains(&r.name));
    }

    reporter.section("Counting plugins");
    let sync = super::repository_sync(config, skip_sync);
    let results = count_only(&repositories, sync.as_ref());
    reporter.report_counts(&results);
    results.iter().all(|r| r.count.is_ok())
}
