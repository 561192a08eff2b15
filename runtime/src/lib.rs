//! dockrun Runtime - build-context archival and image build invocation.
//!
//! This crate turns a source directory into a tar build context and submits
//! it to a container engine, relaying the engine's build log.

pub mod context;
pub mod docker;
pub mod engine;
pub mod invoker;

// Re-export common types
pub use context::{archive_all_files, archive_dockerfile, build_context, BuildContext, ContextEntry};
pub use docker::DockerEngine;
pub use engine::{BuildApi, LogEvent, LogStream};
pub use invoker::{run_build, BuildOutcome};
