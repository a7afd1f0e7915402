//! Helpers for running analysis tools as child processes with timeouts and
//! bounded output capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// How spawning the tool failed, when it never produced output.
#[derive(Debug)]
pub enum SpawnError {
    /// The binary is not on PATH.
    NotFound,
    Other(anyhow::Error),
}

/// Run a command with a timeout, capturing stdout/stderr without risking pipe
/// deadlocks. Output is read concurrently while the child runs;
/// `output_limit_bytes` bounds what is kept in memory (the pipe is still
/// drained past the limit).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput, SpawnError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning analysis tool");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("analysis tool binary not found");
            return Err(SpawnError::NotFound);
        }
        Err(err) => return Err(SpawnError::Other(anyhow::Error::new(err).context("spawn command"))),
    };

    let result = (|| -> Result<CommandOutput> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
        let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

        let mut timed_out = false;
        let status = match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = timeout.as_secs(), "tool timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        };

        let stdout = join_output(stdout_handle).context("join stdout")?;
        let stderr = join_output(stderr_handle).context("join stderr")?;

        debug!(exit_code = ?status.code(), timed_out, "tool finished");
        Ok(CommandOutput {
            status,
            stdout,
            stderr,
            timed_out,
        })
    })();

    result.map_err(SpawnError::Other)
}

fn join_output(handle: thread::JoinHandle<Result<String>>) -> Result<String> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            buf.extend_from_slice(&chunk[..n.min(remaining)]);
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
