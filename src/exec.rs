//! Cancellable execution of the external render command.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ConvertError;

/// Runs the command described by `argv` and captures its stdout.
///
/// The child is raced against `cancel`: if the token fires first the child
/// is killed and reaped and the call returns [`ConvertError::Cancelled`]
/// with no partial output. A non-zero exit carries the child's diagnostic
/// output. Exactly one process is spawned and reaped per call.
pub async fn execute(argv: &[String], cancel: &CancellationToken) -> Result<Vec<u8>, ConvertError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ConvertError::InvalidInput("empty command line".into()))?;

    debug!(command = ?argv, "executing render command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ConvertError::Launch)?;

    let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    // Drain both pipes off to the side; a child writing more than the pipe
    // buffer would otherwise deadlock against wait().
    let reader = tokio::spawn(async move {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let _ = stdout.read_to_end(&mut out).await;
        let _ = stderr.read_to_end(&mut err).await;
        (out, err)
    });

    tokio::select! {
        _ = cancel.cancelled() => {
            // kill() also reaps the child, so no zombie is left behind.
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill cancelled render process");
            }
            reader.abort();
            Err(ConvertError::Cancelled)
        }
        status = child.wait() => {
            let status = status.map_err(ConvertError::Launch)?;
            let (out, err) = reader
                .await
                .map_err(|e| ConvertError::Launch(std::io::Error::other(e)))?;

            if status.success() {
                Ok(out)
            } else {
                let mut output = String::from_utf8_lossy(&err).into_owned();
                if output.trim().is_empty() {
                    output = String::from_utf8_lossy(&out).into_owned();
                }
                Err(ConvertError::NonZeroExit {
                    status: status.code().unwrap_or(-1),
                    output,
                })
            }
        }
    }
}

fn missing_pipe(name: &str) -> ConvertError {
    ConvertError::Launch(std::io::Error::other(format!("{name} pipe not captured")))
}
