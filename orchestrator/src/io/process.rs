//! The narrow process-runner capability every component spawns through.
//!
//! Commands are opaque shell invocations (task commands, validation scripts,
//! blocker diagnostics all share this seam). The [`ProcessRunner`] trait
//! exists so tests can substitute a scripted runner and assert exactly which
//! commands were or were not invoked.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// One command invocation: the shell string plus resource bounds.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub command: String,
    /// Maximum time to wait before the child is killed.
    pub timeout: Duration,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Captured child process result.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// One-line description of why the invocation failed.
    pub fn failure_detail(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let stderr = self.stderr_text();
        let stderr = stderr.trim();
        match (self.exit_code, stderr.is_empty()) {
            (Some(code), true) => format!("exit code {code}"),
            (Some(code), false) => format!("exit code {code}: {stderr}"),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {stderr}"),
        }
    }
}

/// Abstraction over external command execution.
pub trait ProcessRunner {
    /// Spawn the command and wait for it (or its timeout). `Err` means the
    /// command could not be run at all; a failing command is an `Ok` output
    /// with a non-zero exit code.
    fn run(&self, request: &ProcessRequest) -> Result<CommandOutput>;
}

/// Production runner: `sh -c <command>` with timeout and bounded capture.
pub struct ShellRunner;

impl ProcessRunner for ShellRunner {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &ProcessRequest) -> Result<CommandOutput> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&request.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %request.command, "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(err = %err, "failed to spawn command");
                return Err(err).with_context(|| format!("spawn '{}'", request.command));
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        // Drain both pipes concurrently while waiting; a full pipe would
        // otherwise deadlock the child.
        let limit = request.output_limit_bytes;
        let stdout_handle = thread::spawn(move || read_limited(stdout, limit));
        let stderr_handle = thread::spawn(move || read_limited(stderr, limit));

        let mut timed_out = false;
        let status = match child
            .wait_timeout(request.timeout)
            .context("wait for command")?
        {
            Some(status) => status,
            None => {
                warn!(timeout_secs = request.timeout.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        };

        let (stdout, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
        let (stderr, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;
        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(stdout_truncated, stderr_truncated, "output truncated");
        }

        debug!(exit_code = ?status.code(), timed_out, "command finished");
        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            timed_out,
        })
    }
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
