//! Build invocation: submit a context archive and relay the build log.

use std::io::Write;

use futures::StreamExt;
use tokio::sync::watch;

use dockrun_core::error::{BuildError, Result};
use dockrun_core::BuildOptions;

use crate::context::BuildContext;
use crate::engine::{BuildApi, LogEvent};

/// Result of a completed build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Number of log lines relayed to the sink
    pub lines: usize,
    /// Image ID reported by the engine, if any
    pub image_id: Option<String>,
}

/// Submit `context` to `api` and write every log line to `sink` in order.
///
/// The engine is called exactly once. Sending `true` on the `cancel` channel
/// aborts submission or log draining with [`BuildError::Cancelled`]. The log
/// stream is dropped on every exit path; lines already written stay in the
/// sink when a later step fails.
pub async fn run_build<A, W>(
    api: &A,
    context: BuildContext,
    options: &BuildOptions,
    sink: &mut W,
    mut cancel: watch::Receiver<bool>,
) -> Result<BuildOutcome>
where
    A: BuildApi + ?Sized,
    W: Write,
{
    options.validate()?;

    let files = context.entries().len();
    let bytes = context.content_size();
    let archive = context.into_archive();
    tracing::info!(tag = %options.tag, files, bytes, "Building image");

    let mut stream = tokio::select! {
        biased;
        _ = cancelled(&mut cancel) => return Err(BuildError::Cancelled),
        submitted = api.submit(archive, options) => {
            submitted.map_err(|e| BuildError::BuildApi { source: e })?
        }
    };

    let mut outcome = BuildOutcome::default();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                tracing::warn!(lines = outcome.lines, "Build cancelled while streaming log");
                return Err(BuildError::Cancelled);
            }
            next = stream.next() => next,
        };

        match next {
            None => break,
            Some(Ok(LogEvent::Line(line))) => {
                writeln!(sink, "{line}").map_err(BuildError::Output)?;
                outcome.lines += 1;
            }
            Some(Ok(LogEvent::ImageId(id))) => {
                tracing::debug!(image_id = %id, "Engine reported image ID");
                outcome.image_id = Some(id);
            }
            Some(Ok(LogEvent::Failed(message))) => {
                sink.flush().map_err(BuildError::Output)?;
                return Err(BuildError::BuildFailed { message });
            }
            Some(Err(e)) => {
                sink.flush().map_err(BuildError::Output)?;
                return Err(BuildError::LogStream { source: e });
            }
        }
    }

    sink.flush().map_err(BuildError::Output)?;
    tracing::info!(
        tag = %options.tag,
        lines = outcome.lines,
        image_id = outcome.image_id.as_deref().unwrap_or("-"),
        "Image build completed"
    );
    Ok(outcome)
}

/// Resolves once `true` is sent on the cancel channel.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender dropped without cancelling
            std::future::pending::<()>().await;
        }
    }
}
