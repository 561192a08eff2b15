//! BuildApi - seam between the invoker and the container engine.

use async_trait::async_trait;
use bytes::Bytes;
use dockrun_core::{BuildOptions, EngineError};
use futures::stream::BoxStream;

/// One decoded message from the engine's build log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A line of build output, without its trailing newline
    Line(String),
    /// ID of the image produced by the build
    ImageId(String),
    /// The engine reported that the build failed
    Failed(String),
}

/// Sequential build log, consumed once and in order.
pub type LogStream = BoxStream<'static, std::result::Result<LogEvent, EngineError>>;

/// Trait for container engines able to build an image from a tar context.
#[async_trait]
pub trait BuildApi: Send + Sync {
    /// Submit a finalized context archive and return the build log.
    ///
    /// An error here means the request was rejected or never started.
    async fn submit(
        &self,
        archive: Bytes,
        options: &BuildOptions,
    ) -> std::result::Result<LogStream, EngineError>;
}
