//! dockrun Core - shared types for build-context packaging and image builds.
//!
//! Holds the error taxonomy and the build options consumed by the runtime
//! and the CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{BuildOptions, ContextMode, DEFAULT_DOCKERFILE, DEFAULT_TAG};
pub use error::{ArchivePhase, BuildError, EngineError, Result};

/// dockrun version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
