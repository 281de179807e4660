//! RAII guard that moves a working copy aside while it is re-created.
//!
//! [`BackupGuard::new`] renames the directory to a timestamped backup next to
//! it. If the replacement succeeds, [`BackupGuard::commit`] deletes the
//! backup. If the guard is dropped without committing (a failed clone, an
//! early return), whatever was left at the original path is removed and the
//! backup is moved back, so a failed re-clone never loses the previous copy.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use crate::error::PlugcountError;

pub struct BackupGuard {
    original_path: PathBuf,
    /// `None` when there was nothing to back up.
    backup_path: Option<PathBuf>,
    committed: bool,
}

impl BackupGuard {
    /// Moves `path` to `{path}.bak.{epoch_secs}`. A missing `path` yields a
    /// guard that does nothing on drop.
    ///
    /// # Errors
    ///
    /// Returns [`PlugcountError::Io`] if the rename fails.
    pub fn new(path: &Path) -> Result<Self, PlugcountError> {
        let original_path = path.to_path_buf();

        let backup_path = if original_path.exists() {
            let file_name = original_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let backup = original_path.with_file_name(format!(
                "{file_name}.bak.{}",
                Utc::now().timestamp()
            ));
            fs::rename(&original_path, &backup)?;
            Some(backup)
        } else {
            None
        };

        Ok(Self {
            original_path,
            backup_path,
            committed: false,
        })
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    /// Keeps the replacement and deletes the backup.
    ///
    /// # Errors
    ///
    /// Returns [`PlugcountError::Io`] if the backup cannot be removed. The
    /// guard counts as committed either way.
    pub fn commit(mut self) -> Result<(), PlugcountError> {
        self.committed = true;
        if let Some(ref backup) = self.backup_path {
            if backup.exists() {
                fs::remove_dir_all(backup)?;
            }
        }
        Ok(())
    }
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        if let Some(ref backup) = self.backup_path {
            if self.original_path.exists() {
                let _ = fs::remove_dir_all(&self.original_path);
            }
            if let Err(e) = fs::rename(backup, &self.original_path) {
                warn!(
                    backup = %backup.display(),
                    error = %e,
                    "could not restore working copy, backup left in place"
                );
            }
        }
    }
}
