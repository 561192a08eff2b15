use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BuildError, Result};

/// Tag applied to the image when the caller does not provide one.
pub const DEFAULT_TAG: &str = "dockrun/test-image";

/// Dockerfile name looked up inside the build context.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Which files of the source directory go into the build context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Every regular file at the top level of the directory
    #[default]
    AllFiles,
    /// Only the Dockerfile
    DockerfileOnly,
}

/// Options for a single image build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Name and optionally tag of the resulting image (e.g. "myimage:latest")
    pub tag: String,

    /// Dockerfile name, relative to the context root
    pub dockerfile: String,

    /// Context assembly strategy
    pub mode: ContextMode,

    /// Build-time variables
    pub build_args: HashMap<String, String>,

    /// Do not use the engine's layer cache
    pub no_cache: bool,

    /// Remove intermediate containers after a successful build
    pub remove_intermediate: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
            mode: ContextMode::default(),
            build_args: HashMap::new(),
            no_cache: false,
            remove_intermediate: true,
        }
    }
}

impl BuildOptions {
    /// Options with the given image tag and defaults for everything else.
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Check that the options identify a destination image and a Dockerfile.
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(BuildError::InvalidOptions(
                "image tag must not be empty".to_string(),
            ));
        }
        if self.dockerfile.trim().is_empty() {
            return Err(BuildError::InvalidOptions(
                "dockerfile name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = BuildOptions::default();
        assert_eq!(options.tag, DEFAULT_TAG);
        assert_eq!(options.dockerfile, "Dockerfile");
        assert_eq!(options.mode, ContextMode::AllFiles);
        assert!(options.build_args.is_empty());
        assert!(!options.no_cache);
        assert!(options.remove_intermediate);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_with_tag() {
        let options = BuildOptions::with_tag("myimage:1.0");
        assert_eq!(options.tag, "myimage:1.0");
        assert_eq!(options.dockerfile, DEFAULT_DOCKERFILE);
    }

    #[test]
    fn test_validate_rejects_empty_tag() {
        let options = BuildOptions::with_tag("  ");
        let err = options.validate().unwrap_err();
        assert!(matches!(err, BuildError::InvalidOptions(_)));
        assert!(err.to_string().contains("tag"));
    }

    #[test]
    fn test_validate_rejects_empty_dockerfile() {
        let options = BuildOptions {
            dockerfile: String::new(),
            ..BuildOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
