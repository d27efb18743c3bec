//! Error types for the data access layer.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised by the data access layer.
#[derive(Debug)]
pub enum DataError {
    /// Opening the database connection failed.
    ConnectFailed {
        /// Underlying client error.
        source: postgres::Error,
    },
    /// A database operation failed.
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: postgres::Error,
    },
    /// A value could not be used as an SQL identifier.
    InvalidIdentifier {
        /// Field name that carried the identifier.
        field: &'static str,
        /// Offending identifier.
        value: String,
    },
}

impl Display for DataError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed { .. } => formatter.write_str("database connection failed"),
            Self::QueryFailed { .. } => formatter.write_str("database operation failed"),
            Self::InvalidIdentifier { .. } => formatter.write_str("invalid sql identifier"),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConnectFailed { source } | Self::QueryFailed { source, .. } => Some(source),
            Self::InvalidIdentifier { .. } => None,
        }
    }
}
