//! Docker Engine adapter for [`BuildApi`].

use async_trait::async_trait;
use bollard::errors::Error as DockerError;
use bollard::models::BuildInfo;
use bollard::query_parameters::BuildImageOptionsBuilder;
use bollard::Docker;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http_body_util::{Either, Full};

use dockrun_core::error::{BuildError, Result};
use dockrun_core::{BuildOptions, EngineError};

use crate::engine::{BuildApi, LogEvent, LogStream};

/// Build API backed by a local or remote Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the daemon located by the environment (`DOCKER_HOST` or the
    /// platform default socket) and negotiate the API version.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_defaults().map_err(|e| BuildError::Client {
            source: Box::new(e),
        })?;
        let docker = docker
            .negotiate_version()
            .await
            .map_err(|e| BuildError::Client {
                source: Box::new(e),
            })?;

        tracing::debug!(version = ?docker.client_version(), "Connected to Docker engine");
        Ok(Self { docker })
    }
}

#[async_trait]
impl BuildApi for DockerEngine {
    async fn submit(
        &self,
        archive: Bytes,
        options: &BuildOptions,
    ) -> std::result::Result<LogStream, EngineError> {
        let mut builder = BuildImageOptionsBuilder::default()
            .t(&options.tag)
            .dockerfile(&options.dockerfile)
            .rm(options.remove_intermediate)
            .nocache(options.no_cache);
        if !options.build_args.is_empty() {
            builder = builder.buildargs(&options.build_args);
        }
        let build_options = builder.build();

        tracing::info!(
            tag = %options.tag,
            bytes = archive.len(),
            "Submitting build context to Docker"
        );

        let docker = self.docker.clone();
        let body = Either::Left(Full::new(archive));
        let mut raw = async_stream::stream! {
            let inner = docker.build_image(build_options, None, Some(body));
            futures::pin_mut!(inner);
            while let Some(item) = inner.next().await {
                yield item;
            }
        }
        .boxed();

        // The request is only sent once the stream is polled; an error on the
        // first item means the daemon never started the build.
        let first = match raw.next().await {
            Some(Err(e)) if !matches!(e, DockerError::DockerStreamError { .. }) => {
                return Err(Box::new(e));
            }
            first => first,
        };

        let events = stream::iter(first)
            .chain(raw)
            .flat_map(|item| stream::iter(decode(item)));
        Ok(events.boxed())
    }
}

/// Translate one daemon message into log events.
fn decode(
    item: std::result::Result<BuildInfo, DockerError>,
) -> Vec<std::result::Result<LogEvent, EngineError>> {
    let info = match item {
        Ok(info) => info,
        Err(DockerError::DockerStreamError { error }) => return vec![Ok(LogEvent::Failed(error))],
        Err(e) => return vec![Err(Box::new(e) as EngineError)],
    };

    let mut events = Vec::new();
    if let Some(text) = info.stream {
        events.extend(split_lines(&text).map(|line| Ok(LogEvent::Line(line))));
    }
    if let Some(status) = info.status {
        if !status.trim().is_empty() {
            events.push(Ok(LogEvent::Line(status)));
        }
    }
    if let Some(id) = info.aux.and_then(|aux| aux.id) {
        events.push(Ok(LogEvent::ImageId(id)));
    }
    if let Some(detail) = info.error_detail {
        let message = detail
            .message
            .unwrap_or_else(|| "unknown build error".to_string());
        events.push(Ok(LogEvent::Failed(message)));
    }
    events
}

/// Non-empty lines of a `stream` chunk, which may hold several lines or none.
fn split_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ErrorDetail, ImageId};

    fn events(item: std::result::Result<BuildInfo, DockerError>) -> Vec<LogEvent> {
        decode(item).into_iter().map(|e| e.unwrap()).collect()
    }

    #[test]
    fn test_decode_stream_chunk_with_several_lines() {
        let info = BuildInfo {
            stream: Some("Step 1/2 : FROM alpine\n ---> 3f53bb00af94\n".to_string()),
            ..Default::default()
        };
        assert_eq!(
            events(Ok(info)),
            vec![
                LogEvent::Line("Step 1/2 : FROM alpine".to_string()),
                LogEvent::Line(" ---> 3f53bb00af94".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_blank_stream_chunk() {
        let info = BuildInfo {
            stream: Some("\n".to_string()),
            ..Default::default()
        };
        assert!(events(Ok(info)).is_empty());
    }

    #[test]
    fn test_decode_image_id() {
        let info = BuildInfo {
            aux: Some(ImageId {
                id: Some("sha256:abc123".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(
            events(Ok(info)),
            vec![LogEvent::ImageId("sha256:abc123".to_string())]
        );
    }

    #[test]
    fn test_decode_error_detail() {
        let info = BuildInfo {
            error_detail: Some(ErrorDetail {
                code: Some(1),
                message: Some("returned a non-zero code: 1".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(
            events(Ok(info)),
            vec![LogEvent::Failed("returned a non-zero code: 1".to_string())]
        );
    }

    #[test]
    fn test_decode_daemon_stream_error() {
        let err = DockerError::DockerStreamError {
            error: "COPY failed".to_string(),
        };
        assert_eq!(events(Err(err)), vec![LogEvent::Failed("COPY failed".to_string())]);
    }

    #[test]
    fn test_split_lines_strips_carriage_returns() {
        let lines: Vec<String> = split_lines("one\r\ntwo\n\n").collect();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }
}
