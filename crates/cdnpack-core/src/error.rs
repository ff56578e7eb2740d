//! Error types for cdnpack.
//!
//! Only configuration mistakes and unreadable package metadata are errors.
//! CDN misses, unsatisfied peer dependencies and version conflicts are not:
//! they degrade a request to normal bundling and surface as warnings.

use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes, reported in JSON output.
pub mod codes {
    pub const CDN_CONFIG_INVALID: &str = "CDN_CONFIG_INVALID";
    pub const CDN_METADATA_NOT_FOUND: &str = "CDN_METADATA_NOT_FOUND";
    pub const CDN_METADATA_INVALID: &str = "CDN_METADATA_INVALID";
}

/// Fatal error raised while configuring the plugin or resolving a module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CdnError {
    /// Invalid plugin options (e.g. `exclude` together with `only`).
    #[error("{0}")]
    Config(String),

    #[error("Failed to read config at {}: {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },

    /// The package could not be located from the requesting directory.
    #[error("Cannot find package '{name}' from {}", context.display())]
    MetadataNotFound { name: String, context: PathBuf },

    #[error("Invalid package.json at {}: {message}", path.display())]
    MetadataInvalid { path: PathBuf, message: String },
}

impl CdnError {
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    #[must_use]
    pub fn metadata_not_found(name: &str, context: impl Into<PathBuf>) -> Self {
        Self::MetadataNotFound {
            name: name.to_string(),
            context: context.into(),
        }
    }

    #[must_use]
    pub fn metadata_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MetadataInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::ConfigFile { .. } => codes::CDN_CONFIG_INVALID,
            Self::MetadataNotFound { .. } => codes::CDN_METADATA_NOT_FOUND,
            Self::MetadataInvalid { .. } => codes::CDN_METADATA_INVALID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CdnError::config("bad").code(), codes::CDN_CONFIG_INVALID);
        assert_eq!(
            CdnError::metadata_not_found("react", "/app").code(),
            codes::CDN_METADATA_NOT_FOUND
        );
        assert_eq!(
            CdnError::metadata_invalid("/app/package.json", "oops").code(),
            codes::CDN_METADATA_INVALID
        );
    }

    #[test]
    fn test_not_found_message_names_package() {
        let err = CdnError::metadata_not_found("left-pad", "/work/app");
        let msg = err.to_string();
        assert!(msg.contains("'left-pad'"));
        assert!(msg.contains("/work/app"));
    }

    #[test]
    fn test_error_codes_uppercase() {
        for code in [
            codes::CDN_CONFIG_INVALID,
            codes::CDN_METADATA_NOT_FOUND,
            codes::CDN_METADATA_INVALID,
        ] {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
