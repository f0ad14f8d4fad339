/// Database Module
///
/// This module provides the execution side of minidb, organized into
/// focused submodules.
///
/// ## Architecture
///
/// The database layer is split into three concerns:
/// - **Connection** (`connection.rs`): runs finished SQL text against SQLite
/// - **Database** (`database.rs`): the facade holding the connection, the grammar and the table prefixer
/// - **Query** (`query.rs`): the terminal operations that compile an intent and run it
///
/// ## Error Handling
///
/// Connection and grammar failures are normalized into the crate `Error`
/// taxonomy at the boundary of every public operation.
pub mod connection;
pub mod database;
pub mod query;

pub use connection::{Connection, ConnectionError, ConnectionResult, ImportSource, SqliteConnection};
pub use database::Database;
pub use query::{Query, AGGREGATE_ALIAS};
