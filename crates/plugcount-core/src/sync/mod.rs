//! Repository sync: keep a local working copy of each catalog current.
//!
//! [`GitSync`] clones missing working copies, fast-forwards existing ones,
//! and falls back to a fresh clone when a copy is damaged or has diverged.
//! Every git invocation is bounded by a timeout, and an exclusive lock file
//! per repository keeps overlapping runs from syncing the same path at once.

pub mod git;
pub mod guard;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fd_lock::RwLock;
use tracing::{info, warn};

use crate::error::PlugcountError;
use crate::types::TrackedRepository;

pub use guard::BackupGuard;

/// What a successful sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Updated,
    Recloned,
    /// Sync was skipped on request; the existing copy is used as-is.
    Skipped,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Cloned => write!(f, "cloned"),
            SyncAction::Updated => write!(f, "updated"),
            SyncAction::Recloned => write!(f, "re-cloned"),
            SyncAction::Skipped => write!(f, "skipped"),
        }
    }
}

/// Brings a repository's working copy up to date with its remote.
///
/// Implementations must be `Send + Sync` so one instance can serve every
/// repository of a run.
pub trait RepositorySync: Send + Sync {
    fn sync(&self, repo: &TrackedRepository) -> Result<SyncAction, PlugcountError>;
}

/// Uses working copies exactly as they are on disk.
pub struct NoopSync;

impl RepositorySync for NoopSync {
    fn sync(&self, _repo: &TrackedRepository) -> Result<SyncAction, PlugcountError> {
        Ok(SyncAction::Skipped)
    }
}

/// Sync backed by the `git` executable.
pub struct GitSync {
    lock_dir: PathBuf,
    timeout: Duration,
}

impl GitSync {
    /// `lock_dir` holds one `.<name>.lock` file per repository, normally the
    /// repository storage root. `timeout` bounds each git invocation and the
    /// wait for another process's lock.
    pub fn new(lock_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            lock_dir: lock_dir.into(),
            timeout,
        }
    }

    fn clone_into(&self, repo: &TrackedRepository) -> Result<(), PlugcountError> {
        if let Some(parent) = repo.local_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PlugcountError::sync(&repo.name, format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let target = repo.local_path.to_string_lossy();
        info!(repository = %repo.name, remote = %repo.remote_url, "cloning");
        let out = git::git(
            &["clone", "--quiet", repo.remote_url.as_str(), &*target],
            None,
            self.timeout,
        )
        .map_err(|e| PlugcountError::sync(&repo.name, format!("git clone {e}")))?;

        if !out.status.success() {
            return Err(PlugcountError::sync(
                &repo.name,
                format!("git clone failed: {}", out.stderr_summary()),
            ));
        }
        Ok(())
    }

    /// Moves the current copy aside, clones afresh, and restores the old
    /// copy if the clone fails.
    fn reclone(&self, repo: &TrackedRepository) -> Result<SyncAction, PlugcountError> {
        let guard = BackupGuard::new(&repo.local_path).map_err(|e| {
            PlugcountError::sync(&repo.name, format!("cannot move working copy aside: {e}"))
        })?;
        if let Some(backup) = guard.backup_path() {
            info!(repository = %repo.name, backup = %backup.display(), "moved working copy aside");
        }
        self.clone_into(repo)?;
        if let Err(e) = guard.commit() {
            warn!(repository = %repo.name, error = %e, "could not remove old working copy");
        }
        Ok(SyncAction::Recloned)
    }

    /// True when `path` is the top level of a git work tree (not merely a
    /// directory nested inside some other repository).
    fn is_work_tree(&self, path: &Path) -> bool {
        let Ok(out) = git::git(&["rev-parse", "--show-toplevel"], Some(path), self.timeout) else {
            return false;
        };
        if !out.status.success() {
            return false;
        }
        match (
            fs::canonicalize(out.stdout.trim()),
            fs::canonicalize(path),
        ) {
            (Ok(top), Ok(here)) => top == here,
            _ => false,
        }
    }

    fn pull(&self, repo: &TrackedRepository) -> Result<(), String> {
        let out = git::git(
            &["pull", "--ff-only", "--quiet"],
            Some(&repo.local_path),
            self.timeout,
        )
        .map_err(|e| format!("git pull {e}"))?;
        if out.status.success() {
            Ok(())
        } else {
            Err(out.stderr_summary())
        }
    }

    fn lock_path(&self, repo: &TrackedRepository) -> PathBuf {
        self.lock_dir.join(format!(".{}.lock", repo.name))
    }
}

impl RepositorySync for GitSync {
    fn sync(&self, repo: &TrackedRepository) -> Result<SyncAction, PlugcountError> {
        fs::create_dir_all(&self.lock_dir).map_err(|e| {
            PlugcountError::sync(
                &repo.name,
                format!("cannot create {}: {e}", self.lock_dir.display()),
            )
        })?;
        let lock_path = self.lock_path(repo);
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                PlugcountError::sync(&repo.name, format!("cannot open {}: {e}", lock_path.display()))
            })?;
        let mut lock = RwLock::new(lock_file);

        let deadline = Instant::now() + self.timeout;
        let _held = loop {
            match lock.try_write() {
                Ok(guard) => break guard,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(PlugcountError::sync(
                            &repo.name,
                            "another sync of this repository is still running",
                        ));
                    }
                    thread::sleep(Duration::from_millis(200));
                }
                Err(e) => {
                    return Err(PlugcountError::sync(
                        &repo.name,
                        format!("cannot lock {}: {e}", lock_path.display()),
                    ))
                }
            }
        };

        if !repo.local_path.exists() {
            self.clone_into(repo)?;
            return Ok(SyncAction::Cloned);
        }

        if !self.is_work_tree(&repo.local_path) {
            warn!(
                repository = %repo.name,
                path = %repo.local_path.display(),
                "not a git working copy, re-cloning"
            );
            return self.reclone(repo);
        }

        info!(repository = %repo.name, "updating working copy");
        match self.pull(repo) {
            Ok(()) => Ok(SyncAction::Updated),
            Err(reason) => {
                warn!(repository = %repo.name, %reason, "fast-forward failed, re-cloning");
                self.reclone(repo)
            }
        }
    }
}
