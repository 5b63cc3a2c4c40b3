use std::fmt;

use thiserror::Error;

fn render(kind: &str, message: &str, cause: Option<&str>) -> String {
    match cause {
        Some(cause) => format!("{kind}: {message} caused by {cause}"),
        None => format!("{kind}: {message}"),
    }
}

/// Failure taxonomy surfaced by every part of this crate.
///
/// Native driver failures never escape an adapter method; they are caught at
/// the boundary and re-raised as one of these five kinds, with the native
/// description preserved in `cause`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required configuration source could not be located (or used).
    #[error("{}", render("ConfigFileNotFound", .message, .cause.as_deref()))]
    ConfigFileNotFound {
        message: String,
        cause: Option<String>,
    },

    /// The native database driver dependency is absent from the runtime
    /// environment.
    #[error("{}", render("DriverNotInstalled", .message, .cause.as_deref()))]
    DriverNotInstalled {
        message: String,
        cause: Option<String>,
    },

    /// A connect attempt failed (network, auth, timeout).
    #[error("{}", render("DatabaseConnectionError", .message, .cause.as_deref()))]
    DatabaseConnectionError {
        message: String,
        cause: Option<String>,
    },

    /// A command execution, batch execution, or fetch failed after a
    /// connection was established. Also raised when a contract method is
    /// invoked before a successful connect.
    #[error("{}", render("QueryExecutionError", .message, .cause.as_deref()))]
    QueryExecutionError {
        message: String,
        cause: Option<String>,
    },

    /// A commit or rollback failed.
    #[error("{}", render("TransactionError", .message, .cause.as_deref()))]
    TransactionError {
        message: String,
        cause: Option<String>,
    },
}

impl ClientError {
    pub fn config_file_not_found(message: impl Into<String>) -> Self {
        Self::ConfigFileNotFound {
            message: message.into(),
            cause: None,
        }
    }

    pub fn config_file_not_found_with(
        message: impl Into<String>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::ConfigFileNotFound {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn driver_not_installed(message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::DriverNotInstalled {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn connection(message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::DatabaseConnectionError {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryExecutionError {
            message: message.into(),
            cause: None,
        }
    }

    pub fn query_with(message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::QueryExecutionError {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn transaction(message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::TransactionError {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    /// The human-readable message, without the kind tag or cause.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ConfigFileNotFound { message, .. }
            | Self::DriverNotInstalled { message, .. }
            | Self::DatabaseConnectionError { message, .. }
            | Self::QueryExecutionError { message, .. }
            | Self::TransactionError { message, .. } => message,
        }
    }

    /// The stringified native failure this error was raised from, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::ConfigFileNotFound { cause, .. }
            | Self::DriverNotInstalled { cause, .. }
            | Self::DatabaseConnectionError { cause, .. }
            | Self::QueryExecutionError { cause, .. }
            | Self::TransactionError { cause, .. } => cause.as_deref(),
        }
    }
}
