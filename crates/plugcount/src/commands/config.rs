use plugcount_core::Config;

use crate::output::Reporter;

/// Prints the effective configuration, after env overrides and path
/// resolution, as TOML.
pub fn run_config(config: &Config, reporter: &mut Reporter) -> bool {
    match config.to_toml_string() {
        Ok(text) => {
            reporter.data(config);
            reporter.text(text.trim_end());
            true
        }
        Err(e) => {
            reporter.error(&format!("Cannot render configuration: {e}"));
            false
        }
    }
}
