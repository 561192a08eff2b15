use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed cause carried by errors that originate in the container engine client.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// Step of archiving a single file that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePhase {
    /// Opening the file or reading its metadata
    Open,
    /// Reading the file contents
    Read,
    /// Building the tar header
    Header,
    /// Writing header and content into the archive
    Content,
}

impl fmt::Display for ArchivePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            ArchivePhase::Open => "opening",
            ArchivePhase::Read => "reading",
            ArchivePhase::Header => "writing header",
            ArchivePhase::Content => "writing content",
        };
        f.write_str(phase)
    }
}

/// dockrun error types
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build context directory missing or unresolvable
    #[error("Context path not found: {}: {source}", .path.display())]
    ContextPathNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing the build context directory failed
    #[error("Context directory read failed: {}: {source}", .path.display())]
    ContextDirRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single context file could not be read or added to the archive
    #[error("Context file read failed ({phase} {name}): {source}")]
    ContextFileRead {
        name: String,
        phase: ArchivePhase,
        #[source]
        source: std::io::Error,
    },

    /// Writing the end-of-archive marker failed
    #[error("Context archive could not be finalized: {source}")]
    ContextArchive {
        #[source]
        source: std::io::Error,
    },

    /// Container engine client could not be created
    #[error("Docker client error: {source}")]
    Client {
        #[source]
        source: EngineError,
    },

    /// The build request was rejected or never started
    #[error("Build API error: {source}")]
    BuildApi {
        #[source]
        source: EngineError,
    },

    /// The engine accepted the request but reported a failed build
    #[error("Image build failed: {message}")]
    BuildFailed { message: String },

    /// The log stream broke before reaching its end
    #[error("Build log stream error: {source}")]
    LogStream {
        #[source]
        source: EngineError,
    },

    /// Relaying a log line to the output failed
    #[error("Output error: {0}")]
    Output(#[source] std::io::Error),

    /// Build interrupted by the caller
    #[error("Build cancelled")]
    Cancelled,

    /// Build options rejected before submission
    #[error("Invalid build options: {0}")]
    InvalidOptions(String),
}

impl BuildError {
    /// Name of the context file involved in the failure, if any.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            BuildError::ContextFileRead { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Result type alias for dockrun operations
pub type Result<T> = std::result::Result<T, BuildError>;
