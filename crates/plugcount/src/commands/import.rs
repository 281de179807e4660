//! Handler for `plugcount import-legacy`.

use std::path::Path;

use plugcount_core::{Config, HistoryStore};

use crate::output::Reporter;

/// Imports a legacy `plugin_history.json` (repository to date to count) into
/// the history log.
pub fn run_import(config: &Config, path: &Path, reporter: &mut Reporter) -> bool {
    let mut store = match HistoryStore::open(&config.data_dir) {
        Ok(s) => s,
        Err(e) => {
            reporter.error(&format!("Cannot open history: {e}"));
            return false;
        }
    };

    let imported = match store.import_legacy(path) {
        Ok(n) => n,
        Err(e) => {
            reporter.error(&format!("Import failed: {e}"));
            return false;
        }
    };

    if let Err(e) = store.close() {
        reporter.error(&format!("History store did not close cleanly: {e}"));
        return false;
    }

    if imported == 0 {
        reporter.info("Nothing imported: every repository already has history");
    } else {
        reporter.success(&format!(
            "Imported {imported} sample(s) from {}",
            path.display()
        ));
    }
    true
}
