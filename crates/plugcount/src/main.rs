mod cli;
mod commands;
mod logging;
mod output;

use std::io::{self, IsTerminal};
use std::path::Path;

use clap::{CommandFactory, Parser};
use cli::{Cli, ColorMode, Commands};
use logging::LogOptions;
use output::{OutputMode, Reporter};
use plugcount_core::Config;

fn main() {
    let cli = Cli::parse();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Human
    };

    match cli.color {
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Auto => {}
    }

    let command = cli.command.clone().unwrap_or_default();

    if let Commands::Completions { shell } = command {
        clap_complete::generate(shell, &mut Cli::command(), "plugcount", &mut io::stdout());
        return;
    }

    let mut reporter = Reporter::new(mode);

    let success = match load_config(cli.config.as_deref(), &mut reporter) {
        Some(config) => {
            let log_options = LogOptions {
                verbose: cli.verbose,
                quiet: cli.quiet,
                json: cli.json,
                ansi: stderr_ansi(&cli.color),
            };
            if let Some(message) = logging::setup_logging(log_options, &config.logs_dir) {
                reporter.warning(&message);
            }
            dispatch(command, &config, &mut reporter)
        }
        None => false,
    };

    reporter.finish();

    if !success {
        std::process::exit(1);
    }
}

/// Whether log lines on stderr should carry ANSI colors.
fn stderr_ansi(color: &ColorMode) -> bool {
    match color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

fn dispatch(command: Commands, config: &Config, reporter: &mut Reporter) -> bool {
    match command {
        Commands::Run { dry_run, skip_sync } => {
            commands::run::run_pipeline(config, dry_run, skip_sync, reporter)
        }
        Commands::Count {
            repositories,
            skip_sync,
        } => commands::count::run_count(config, &repositories, skip_sync, reporter),
        Commands::History {
            repository,
            since,
            limit,
        } => commands::history::run_history(config, repository.as_deref(), since, limit, reporter),
        Commands::ImportLegacy { path } => commands::import::run_import(config, &path, reporter),
        Commands::Config => commands::config::run_config(config, reporter),
        Commands::Completions { .. } => true,
    }
}

/// Loads the config file (if any), applies environment overrides and
/// resolves directories against the working directory.
fn load_config(explicit: Option<&Path>, reporter: &mut Reporter) -> Option<Config> {
    let cwd = match std::env::current_dir() {
        Ok(c) => c,
        Err(e) => {
            reporter.error(&format!("Cannot get current directory: {e}"));
            return None;
        }
    };

    let path = Config::locate(explicit, &cwd, |key| std::env::var(key).ok());
    let mut config = match Config::load(path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            reporter.error(&format!("{e}"));
            return None;
        }
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.resolve_paths(&cwd);

    if let Err(e) = config.validate() {
        reporter.error(&format!("{e}"));
        return None;
    }
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_color_modes_decide_log_ansi() {
        assert!(stderr_ansi(&ColorMode::Always));
        assert!(!stderr_ansi(&ColorMode::Never));
    }
}
