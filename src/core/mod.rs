/// Core Module for minidb
///
/// This module contains the fundamental components that every query runs
/// through: the database facade and its connection, the query terminal
/// operations, the shared value type and the normalized error taxonomy.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{Error, ErrorKind, Result, UpstreamError};
pub use value::{Row, Value};
