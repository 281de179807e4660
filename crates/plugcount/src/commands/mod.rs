pub mod config;
pub mod count;
pub mod history;
pub mod import;
pub mod run;

use plugcount_core::sync::{GitSync, NoopSync, RepositorySync};
use plugcount_core::Config;

/// Git-backed sync rooted at the repository storage dir, or a no-op when the
/// caller asked to count existing working copies as they are.
pub(crate) fn repository_sync(config: &Config, skip_sync: bool) -> Box<dyn RepositorySync> {
    if skip_sync {
        Box::new(NoopSync)
    } else {
        Box::new(GitSync::new(config.repos_dir.clone(), config.sync_timeout()))
    }
}
