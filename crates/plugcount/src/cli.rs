use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "plugcount",
    version,
    about = "Count plugin catalog entries and report 24h growth"
)]
pub struct Cli {
    /// Defaults to `run` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the TOML config file (overrides $PLUGCOUNT_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Color mode
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorMode,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sync, count, record history and send the summary
    Run {
        /// Compute and print the summary without recording or sending it
        #[arg(long)]
        dry_run: bool,

        /// Count the existing working copies without fetching
        #[arg(long)]
        skip_sync: bool,
    },

    /// Sync and count repositories without recording anything
    Count {
        /// Repository names (omit for all)
        repositories: Vec<String>,

        /// Count the existing working copies without fetching
        #[arg(long)]
        skip_sync: bool,
    },

    /// Show recorded samples
    History {
        /// Repository name (omit for all)
        repository: Option<String>,

        /// Only samples at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Show only the most recent N samples
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Import a legacy plugin_history.json into the history log
    ImportLegacy {
        /// Path to plugin_history.json
        path: PathBuf,
    },

    /// Print the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run {
            dry_run: false,
            skip_sync: false,
        }
    }
}
