use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::BackendError;

/// Run `program` to completion, capturing its output.
///
/// With a `limit`, the child is killed and a timeout error returned once it
/// elapses.
pub(crate) async fn run_captured(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    limit: Option<Duration>,
) -> Result<Output, BackendError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(program, ?args, "Spawning tool");

    let child = command
        .spawn()
        .map_err(|e| BackendError::spawn(program, e))?;

    let output = match limit {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| BackendError::timeout(format!("{program} after {}s", limit.as_secs())))?,
        None => child.wait_with_output().await,
    };

    output.map_err(|e| BackendError::spawn(program, e))
}

/// Convert a finished run into its stdout, classifying failures from stderr.
pub(crate) fn stdout_or_error(output: Output) -> Result<String, BackendError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        Err(BackendError::from_stderr(&stdout))
    } else {
        Err(BackendError::from_stderr(&stderr))
    }
}
