use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub const LOG_FILE: &str = "plugcount.log";

/// Logging knobs taken from the global CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    pub verbose: u8,
    pub quiet: bool,
    pub json: bool,
    /// Colorize the stderr layer.
    pub ansi: bool,
}

impl LogOptions {
    fn level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Directive for the stderr layer. `--quiet` only lets errors through.
    fn stderr_directive(&self) -> String {
        if self.quiet {
            "plugcount=error,plugcount_core=error".to_string()
        } else {
            crate_directive(self.level())
        }
    }
}

fn crate_directive(level: &str) -> String {
    format!("plugcount={level},plugcount_core={level}")
}

/// `RUST_LOG` wins over the flags when set.
fn filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

fn open_log_file(logs_dir: &Path) -> std::io::Result<File> {
    fs::create_dir_all(logs_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(LOG_FILE))
}

/// Installs the global subscriber: stderr plus `<logs_dir>/plugcount.log`.
///
/// The file layer ignores `--quiet` so cron runs keep a full record. If the
/// log file cannot be opened, logging continues on stderr only and the
/// error is returned as a message for the caller to surface.
pub fn setup_logging(options: LogOptions, logs_dir: &Path) -> Option<String> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let stderr_filter = filter(&options.stderr_directive());
    if options.json {
        layers.push(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_ansi(options.ansi)
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter)
                .boxed(),
        );
    }

    let mut file_error = None;
    match open_log_file(logs_dir) {
        Ok(file) => layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter(&crate_directive(options.level())))
                .boxed(),
        ),
        Err(e) => {
            file_error = Some(format!(
                "cannot open log file in {}: {e}",
                logs_dir.display()
            ))
        }
    }

    // A subscriber may already be installed (tests); that is not an error.
    let _ = tracing_subscriber::registry().with(layers).try_init();
    file_error
}
