//! Bounded invocation of external commands.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty stderr line, for error messages.
    pub fn stderr_summary(&self) -> String {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| l.to_string())
            .unwrap_or_else(|| format!("exited with {}", self.status))
    }
}

#[derive(Debug)]
pub enum CommandError {
    Spawn(std::io::Error),
    TimedOut(Duration),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Spawn(e) => write!(f, "failed to run command: {e}"),
            CommandError::TimedOut(t) => write!(f, "timed out after {}s", t.as_secs()),
        }
    }
}

/// Runs `program` with `args`, killing it once `timeout` elapses.
///
/// Output pipes are drained on background threads so a chatty child cannot
/// block on a full pipe while we wait.
pub fn run_command(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(CommandError::Spawn)?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(CommandError::Spawn)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::TimedOut(timeout));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    Ok(CommandOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Runs `git` with `args`.
pub fn git(
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    run_command("git", args, cwd, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_output_and_status() {
        let out = git(&["--version"], None, Duration::from_secs(30)).unwrap();
        assert!(out.status.success());
        assert!(out.stdout.starts_with("git version"));
    }

    #[test]
    fn failing_command_reports_stderr() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = git(
            &["rev-parse", "--show-toplevel"],
            Some(tmp.path()),
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(!out.status.success());
        assert!(out.stderr_summary().contains("not a git repository"));
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let started = Instant::now();
        let result = run_command("sleep", &["5"], None, Duration::from_millis(200));
        assert!(matches!(result, Err(CommandError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = run_command(
            "plugcount-definitely-not-a-command",
            &[],
            None,
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(CommandError::Spawn(_))));
    }
}
