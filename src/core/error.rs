/// minidb Error Module
///
/// This module defines the closed error taxonomy every public operation
/// returns. Errors raised by the connection and by the grammar are collected
/// as an [`UpstreamError`] and normalized exactly once, at the boundary of
/// the public operation, by [`wrap_error`].
use crate::core::db::connection::ConnectionError;
use crate::core::value::Value;
use crate::grammar::CompileError;
use std::error::Error as StdError;
use thiserror::Error;
use tracing::debug;

/// An error raised by one of the collaborators before normalization.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Normalized error type returned by `Query` and `Database` operations.
///
/// Each variant keeps the upstream error it was made from as its source.
#[derive(Error, Debug)]
pub enum Error {
    /// The database driver rejected a statement
    #[error("{message}")]
    Database {
        message: String,
        query: Option<String>,
        values: Vec<Value>,
        #[source]
        source: ConnectionError,
    },

    /// Malformed input: bad bindings, a non-positive chunk size, an unknown operator
    #[error("{message}")]
    InvalidArgument {
        message: String,
        #[source]
        source: Option<UpstreamError>,
    },

    /// A closure-built query fragment has the wrong shape
    #[error("{message}")]
    InvalidReturnValue {
        message: String,
        #[source]
        source: CompileError,
    },

    /// The query can't be built in the target dialect
    #[error("{message}")]
    IncorrectQuery {
        message: String,
        #[source]
        source: CompileError,
    },

    /// An import source couldn't be read
    #[error("{message}")]
    File {
        message: String,
        #[source]
        source: ConnectionError,
    },

    /// An upstream error of a kind the taxonomy doesn't recognize, passed through as is
    #[error("{0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

/// Discriminant of [`Error`], handy for assertions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    InvalidArgument,
    InvalidReturnValue,
    IncorrectQuery,
    File,
    Other,
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Database { .. } => ErrorKind::Database,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::InvalidReturnValue { .. } => ErrorKind::InvalidReturnValue,
            Error::IncorrectQuery { .. } => ErrorKind::IncorrectQuery,
            Error::File { .. } => ErrorKind::File,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// The SQL text the driver rejected. Only driver failures carry one.
    pub fn query(&self) -> Option<&str> {
        match self {
            Error::Database { query, .. } => query.as_deref(),
            _ => None,
        }
    }

    /// The values bound to the rejected statement; empty for other kinds.
    pub fn values(&self) -> &[Value] {
        match self {
            Error::Database { values, .. } => values,
            _ => &[],
        }
    }
}

/// Type alias for Result to use the normalized Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Maps an upstream error onto the taxonomy.
///
/// Errors of an unrecognized kind come out as [`Error::Other`] holding the
/// very same boxed error.
pub fn wrap_error(error: UpstreamError) -> Error {
    debug!(error = %error, "normalizing upstream error");

    match error {
        UpstreamError::Connection(error) => {
            let message = error.to_string();
            match error {
                ConnectionError::Driver { .. } | ConnectionError::Open { .. } => {
                    let (query, values) = error.diagnostics();
                    Error::Database {
                        message,
                        query,
                        values,
                        source: error,
                    }
                }
                ConnectionError::InvalidArgument(_) => Error::InvalidArgument {
                    message,
                    source: Some(UpstreamError::Connection(error)),
                },
                ConnectionError::File { .. } => Error::File {
                    message,
                    source: error,
                },
                ConnectionError::Other(inner) => Error::Other(inner),
            }
        }
        UpstreamError::Compile(error) => {
            let message = error.to_string();
            match error {
                CompileError::InvalidArgument(_) => Error::InvalidArgument {
                    message,
                    source: Some(UpstreamError::Compile(error)),
                },
                CompileError::InvalidReturnValue(_) => Error::InvalidReturnValue {
                    message,
                    source: error,
                },
                CompileError::InvalidQuery(_) => Error::IncorrectQuery {
                    message,
                    source: error,
                },
                CompileError::Other(inner) => Error::Other(inner),
            }
        }
    }
}

/// Runs one public operation and normalizes whatever it fails with.
pub(crate) fn perform<T, E, F>(operation: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: Into<UpstreamError>,
{
    operation().map_err(|error| wrap_error(error.into()))
}
