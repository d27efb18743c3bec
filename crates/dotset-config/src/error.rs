//! Error types for settings operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for settings operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Dotted key was empty or contained an empty segment.
    #[error("invalid settings key")]
    InvalidKey {
        /// Key supplied by the caller.
        key: String,
    },
    /// Row backend operation failed.
    #[error("data access failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: dotset_data::DataError,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File involved in the operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Serialising a value failed.
    #[error("failed to encode settings value")]
    Encode {
        /// Operation identifier.
        operation: &'static str,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// Defaults or configuration document could not be parsed.
    #[error("failed to parse document")]
    DocumentParse {
        /// Document path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
    /// Environment override carried an unusable value.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// Configuration field failed validation.
    #[error("invalid configuration setting")]
    InvalidSetting {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn data(
        operation: &'static str,
    ) -> impl FnOnce(dotset_data::DataError) -> Self {
        move |source| Self::Data { operation, source }
    }
}

/// Convenience alias for settings results.
pub type ConfigResult<T> = Result<T, ConfigError>;
