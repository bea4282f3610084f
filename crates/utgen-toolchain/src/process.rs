//! Subprocess execution with time limits

use crate::error::ToolchainError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of one finished step
#[derive(Debug, Clone)]
pub(crate) struct StepOutput {
    pub(crate) exit_code: Option<i32>,
    pub(crate) success: bool,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl StepOutput {
    /// Log section in the shape `$ cmd` followed by both streams
    pub(crate) fn section(&self, title: &str) -> String {
        let mut out = format!("$ {title}\n");
        if !self.stdout.is_empty() {
            out.push_str(&self.stdout);
            if !self.stdout.ends_with('\n') {
                out.push('\n');
            }
        }
        if !self.stderr.is_empty() {
            out.push_str(&self.stderr);
            if !self.stderr.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Run `program` with `args` in `cwd`, killing it once `limit` elapses
pub(crate) async fn run_step<I, S>(
    step: &str,
    program: &str,
    args: I,
    cwd: &Path,
    limit: Duration,
) -> Result<StepOutput, ToolchainError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolchainError::Missing {
                tool: program.to_string(),
                source: e,
            }
        } else {
            ToolchainError::io_error(cwd, e)
        }
    })?;

    tracing::debug!(step, program, cwd = %cwd.display(), "running toolchain step");
    match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(StepOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) => Err(ToolchainError::io_error(cwd, e)),
        Err(_) => {
            tracing::warn!(step, limit_secs = limit.as_secs_f64(), "toolchain step timed out");
            Err(ToolchainError::timeout(step, limit))
        }
    }
}
