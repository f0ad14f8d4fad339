/// Connection Module
///
/// This module defines the `Connection` collaborator that runs finished SQL
/// text, and `SqliteConnection`, its implementation on top of rusqlite.
///
/// Connections know nothing about table prefixes or query intents: they get
/// SQL text plus positional bindings and report failures as
/// `ConnectionError`, which the caller normalizes.

use crate::config::SqliteOptions;
use crate::core::value::{render_values, Row, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::params_from_iter;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Low-level failure raised by a connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The driver rejected the statement
    #[error("{source}; SQL query: ({query}); bound values: {}", render_values(.values))]
    Driver {
        query: String,
        values: Vec<Value>,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The connection couldn't be opened
    #[error("Failed to open database `{dsn}`: {reason}")]
    Open { dsn: String, reason: String },

    /// The binding set doesn't fit the statement
    #[error("{0}")]
    InvalidArgument(String),

    /// An import source couldn't be read
    #[error("Failed to read `{path}`: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Anything else a custom connection wants to report
    #[error("{0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

impl ConnectionError {
    /// SQL text and bindings of a driver failure.
    pub fn diagnostics(&self) -> (Option<String>, Vec<Value>) {
        match self {
            ConnectionError::Driver { query, values, .. } => (Some(query.clone()), values.clone()),
            _ => (None, Vec::new()),
        }
    }
}

pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// A source of SQL statements for [`Connection::import_from_source`].
pub enum ImportSource {
    /// A file path
    Path(PathBuf),
    /// An open reader; it is read to the end
    Reader(Box<dyn Read + Send>),
}

impl ImportSource {
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        ImportSource::Reader(Box::new(reader))
    }

    /// Reads the whole source into memory.
    pub fn read_to_string(self) -> ConnectionResult<String> {
        match self {
            ImportSource::Path(path) => fs::read_to_string(&path).map_err(|source| ConnectionError::File {
                path: path.display().to_string(),
                source,
            }),
            ImportSource::Reader(mut reader) => {
                let mut content = String::new();
                reader
                    .read_to_string(&mut content)
                    .map_err(|source| ConnectionError::File {
                        path: "<reader>".to_string(),
                        source,
                    })?;
                Ok(content)
            }
        }
    }
}

impl fmt::Debug for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImportSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<PathBuf> for ImportSource {
    fn from(path: PathBuf) -> Self {
        ImportSource::Path(path)
    }
}

impl From<&Path> for ImportSource {
    fn from(path: &Path) -> Self {
        ImportSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ImportSource {
    fn from(path: &str) -> Self {
        ImportSource::Path(PathBuf::from(path))
    }
}

/// Executes finished SQL against a database.
///
/// Implementations must tolerate being shared between the `Database`
/// copies made by `with_table_prefix`/`with_tables_prefixed`.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Runs a query and returns every row.
    fn select_rows(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<Vec<Row>>;

    /// Runs a query and returns its first row, if any.
    fn select_one_row(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<Option<Row>>;

    /// Runs a data-modifying statement and returns the number of affected rows.
    fn execute_write(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<u64>;

    /// Runs an insert and returns the generated identifier.
    fn execute_write_returning_id(
        &self,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> ConnectionResult<i64>;

    /// Runs a single statement of any kind, ignoring its result.
    fn execute_statement(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<()>;

    /// Runs every statement of a semicolon-separated block.
    fn execute_multi_statement(&self, sql: &str) -> ConnectionResult<()>;

    /// Reads statements from a file or a reader and runs them all.
    fn import_from_source(&self, source: ImportSource) -> ConnectionResult<()>;
}

static DSN_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]+):").expect("valid DSN scheme pattern"));

/// Where a SQLite DSN points to
#[derive(Debug, Clone, PartialEq)]
enum SqliteTarget {
    Memory,
    File(PathBuf),
}

/// Parses `sqlite::memory:`, `sqlite:<path>`, `:memory:` or a bare path.
fn parse_dsn(dsn: &str) -> ConnectionResult<SqliteTarget> {
    let open_error = |reason: &str| ConnectionError::Open {
        dsn: dsn.to_string(),
        reason: reason.to_string(),
    };

    let location = match DSN_SCHEME.captures(dsn) {
        Some(captures) if captures[1].eq_ignore_ascii_case("sqlite") => &dsn[captures[0].len()..],
        Some(captures) => {
            return Err(open_error(&format!(
                "the `{}` driver is not supported, only SQLite DSNs can be opened",
                &captures[1]
            )))
        }
        None => dsn,
    };

    match location.trim() {
        "" => Err(open_error("the DSN doesn't name a database")),
        ":memory:" => Ok(SqliteTarget::Memory),
        path => Ok(SqliteTarget::File(PathBuf::from(path))),
    }
}

/// SQLite connection backed by rusqlite.
///
/// The rusqlite handle isn't `Sync`, so it is kept behind a mutex; every
/// call holds the lock for the duration of one statement.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Opens a connection with the default options
    ///
    /// # Arguments
    ///
    /// * `dsn` - `sqlite::memory:`, `sqlite:<path>`, or a bare file path
    ///
    /// # Returns
    ///
    /// The open connection, or `ConnectionError::Open` for DSNs of other
    /// drivers and `ConnectionError::Driver` when SQLite refuses the file.
    pub fn open(dsn: &str) -> ConnectionResult<Self> {
        Self::open_with_options(dsn, &SqliteOptions::default())
    }

    /// Opens a connection and applies the given pragmas
    pub fn open_with_options(dsn: &str, options: &SqliteOptions) -> ConnectionResult<Self> {
        let target = parse_dsn(dsn)?;
        info!(dsn, "Opening SQLite connection");

        let conn = match &target {
            SqliteTarget::Memory => rusqlite::Connection::open_in_memory(),
            SqliteTarget::File(path) => rusqlite::Connection::open(path),
        }
        .map_err(|e| ConnectionError::Open {
            dsn: dsn.to_string(),
            reason: e.to_string(),
        })?;

        let connection = Self::from_connection(conn);
        connection.configure(options)?;
        Ok(connection)
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> ConnectionResult<Self> {
        Self::open("sqlite::memory:")
    }

    /// Wraps an already open rusqlite connection
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        SqliteConnection {
            conn: Mutex::new(conn),
        }
    }

    fn configure(&self, options: &SqliteOptions) -> ConnectionResult<()> {
        let mut pragmas = format!(
            "PRAGMA foreign_keys = {};",
            if options.foreign_keys { "ON" } else { "OFF" }
        );
        if let Some(timeout) = options.busy_timeout_ms {
            pragmas.push_str(&format!(" PRAGMA busy_timeout = {};", timeout));
        }
        debug!(pragmas = %pragmas, "Configuring SQLite connection");
        self.execute_multi_statement(&pragmas)
    }

    fn lock(&self) -> MutexGuard<'_, rusqlite::Connection> {
        // A panic in another caller doesn't leave the SQLite handle in a broken state
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Converts a rusqlite failure into a connection error for the given statement
fn driver_error(error: rusqlite::Error, sql: &str, bindings: &[Value]) -> ConnectionError {
    match error {
        rusqlite::Error::InvalidParameterCount(given, expected) => ConnectionError::InvalidArgument(format!(
            "The statement expects {} bound values, {} given",
            expected, given
        )),
        rusqlite::Error::InvalidParameterName(name) => {
            ConnectionError::InvalidArgument(format!("Unknown binding name `{}`", name))
        }
        other => ConnectionError::Driver {
            query: sql.to_string(),
            values: bindings.to_vec(),
            source: Box::new(other),
        },
    }
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut values = Row::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        values.insert(column.clone(), Value::from(row.get_ref(index)?));
    }
    Ok(values)
}

impl Connection for SqliteConnection {
    fn select_rows(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<Vec<Row>> {
        debug!(sql, bindings = bindings.len(), "select");
        let conn = self.lock();
        let fail = |e: rusqlite::Error| driver_error(e, sql, bindings);

        let mut stmt = conn.prepare(sql).map_err(fail)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map(params_from_iter(bindings.iter()), |row| read_row(row, &columns))
            .map_err(fail)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(fail)?;
        Ok(rows)
    }

    fn select_one_row(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<Option<Row>> {
        debug!(sql, bindings = bindings.len(), "select first");
        let conn = self.lock();
        let fail = |e: rusqlite::Error| driver_error(e, sql, bindings);

        let mut stmt = conn.prepare(sql).map_err(fail)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(bindings.iter())).map_err(fail)?;
        let first = match rows.next().map_err(fail)? {
            Some(row) => Some(read_row(row, &columns).map_err(fail)?),
            None => None,
        };
        Ok(first)
    }

    fn execute_write(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<u64> {
        debug!(sql, bindings = bindings.len(), "write");
        let conn = self.lock();
        let fail = |e: rusqlite::Error| driver_error(e, sql, bindings);

        let mut stmt = conn.prepare(sql).map_err(fail)?;
        let affected = stmt.execute(params_from_iter(bindings.iter())).map_err(fail)?;
        Ok(affected as u64)
    }

    fn execute_write_returning_id(
        &self,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> ConnectionResult<i64> {
        debug!(sql, bindings = bindings.len(), sequence = ?sequence, "write returning id");
        let conn = self.lock();
        let fail = |e: rusqlite::Error| driver_error(e, sql, bindings);

        // SQLite has no sequence objects; the rowid is the identifier
        let mut stmt = conn.prepare(sql).map_err(fail)?;
        stmt.execute(params_from_iter(bindings.iter())).map_err(fail)?;
        Ok(conn.last_insert_rowid())
    }

    fn execute_statement(&self, sql: &str, bindings: &[Value]) -> ConnectionResult<()> {
        debug!(sql, bindings = bindings.len(), "statement");
        let conn = self.lock();
        let fail = |e: rusqlite::Error| driver_error(e, sql, bindings);

        let mut stmt = conn.prepare(sql).map_err(fail)?;
        let mut rows = stmt.query(params_from_iter(bindings.iter())).map_err(fail)?;
        while rows.next().map_err(fail)?.is_some() {}
        Ok(())
    }

    fn execute_multi_statement(&self, sql: &str) -> ConnectionResult<()> {
        debug!(sql, "statements");
        self.lock()
            .execute_batch(sql)
            .map_err(|e| driver_error(e, sql, &[]))
    }

    fn import_from_source(&self, source: ImportSource) -> ConnectionResult<()> {
        debug!(source = ?source, "import");
        let sql = source.read_to_string()?;
        self.execute_multi_statement(&sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn setup_test_table(conn: &SqliteConnection) {
        conn.execute_multi_statement(
            "
            CREATE TABLE test (
                id INTEGER PRIMARY KEY,
                name TEXT,
                value NUMERIC
            );
            INSERT INTO test (name, value) VALUES ('Banana', 123.4);
            INSERT INTO test (name, value) VALUES ('Apple', -10);
            INSERT INTO test (name, value) VALUES ('Pen', 0);
        ",
        )
        .unwrap();
    }

    #[test]
    fn test_parse_dsn() {
        assert_eq!(parse_dsn("sqlite::memory:").unwrap(), SqliteTarget::Memory);
        assert_eq!(parse_dsn(":memory:").unwrap(), SqliteTarget::Memory);
        assert_eq!(
            parse_dsn("sqlite:/tmp/app.db").unwrap(),
            SqliteTarget::File(PathBuf::from("/tmp/app.db"))
        );
        assert_eq!(
            parse_dsn("data/app.db").unwrap(),
            SqliteTarget::File(PathBuf::from("data/app.db"))
        );
        assert!(matches!(parse_dsn("foo:bar"), Err(ConnectionError::Open { .. })));
        assert!(matches!(parse_dsn("mysql:host=localhost"), Err(ConnectionError::Open { .. })));
        assert!(matches!(parse_dsn("sqlite:"), Err(ConnectionError::Open { .. })));
    }

    #[test]
    fn test_select_rows_and_first_row() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let rows = conn
            .select_rows("SELECT * FROM test WHERE value >= ? ORDER BY id", &[Value::from(0)])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["id", "name", "value"]);
        assert_eq!(rows[0]["name"], Value::from("Banana"));
        assert_eq!(rows[0]["value"], Value::Real(123.4));
        assert_eq!(rows[1]["value"], Value::Integer(0));

        let first = conn.select_one_row("SELECT name FROM test ORDER BY id", &[]).unwrap();
        assert_eq!(first.unwrap()["name"], Value::from("Banana"));

        let none = conn
            .select_one_row("SELECT * FROM test WHERE name = ?", &[Value::from("Orange")])
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_writes() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let inserted = conn
            .execute_write(
                "INSERT INTO test (name, value) VALUES (?, ?), (?, ?)",
                &[Value::from("Orange"), Value::from(314), Value::from("Pillow"), Value::from(219)],
            )
            .unwrap();
        assert_eq!(inserted, 2);

        let id = conn
            .execute_write_returning_id(
                "INSERT INTO test (name, value) VALUES (?, ?)",
                &[Value::from("Mug"), Value::from(-1)],
                None,
            )
            .unwrap();
        assert_eq!(id, 6);

        let updated = conn
            .execute_write("UPDATE test SET name = name || ? WHERE value > ?", &[Value::from("!"), Value::from(100)])
            .unwrap();
        assert_eq!(updated, 3);

        let deleted = conn.execute_write("DELETE FROM test WHERE value < ?", &[Value::from(0)]).unwrap();
        assert_eq!(deleted, 2);
    }

    #[test]
    fn test_bool_binding() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let row = conn
            .select_one_row("SELECT ? AS yes, ? AS no", &[Value::from(true), Value::from(false)])
            .unwrap()
            .unwrap();
        assert_eq!(row["yes"], Value::Integer(1));
        assert_eq!(row["no"], Value::Integer(0));
    }

    #[test]
    fn test_driver_error_carries_statement() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let error = conn
            .select_rows("WRONG SQL", &[Value::from("foo"), Value::from(true)])
            .unwrap_err();

        match &error {
            ConnectionError::Driver { query, values, .. } => {
                assert_eq!(query, "WRONG SQL");
                assert_eq!(values, &vec![Value::from("foo"), Value::from(true)]);
            }
            other => panic!("Expected Driver error, got {:?}", other),
        }
        assert!(error
            .to_string()
            .ends_with(r#"; SQL query: (WRONG SQL); bound values: ["foo", true]"#));
    }

    #[test]
    fn test_binding_count_mismatch() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let error = conn
            .select_rows("SELECT ? AS a", &[Value::from(1), Value::from(2)])
            .unwrap_err();
        assert!(matches!(error, ConnectionError::InvalidArgument(_)));
    }

    #[test]
    fn test_import_from_reader_and_missing_file() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let script = "
            CREATE TABLE test2(id INTEGER PRIMARY KEY ASC, text TEXT);
            INSERT INTO test2 (text) VALUES ('Hello'), ('World');
        ";
        conn.import_from_source(ImportSource::reader(Cursor::new(script.to_string())))
            .unwrap();

        let row = conn
            .select_one_row("SELECT COUNT(*) AS count FROM test2", &[])
            .unwrap()
            .unwrap();
        assert_eq!(row["count"], Value::Integer(2));

        let error = conn
            .import_from_source(ImportSource::from("/not/existing/file/__gBpDtW"))
            .unwrap_err();
        assert!(matches!(error, ConnectionError::File { .. }));
    }

    #[test]
    fn test_statement_runs_ddl() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_statement("CREATE TABLE t (id INTEGER)", &[]).unwrap();
        let tables = conn
            .select_rows(
                "SELECT name FROM sqlite_master WHERE type = ? AND name = ?",
                &[Value::from("table"), Value::from("t")],
            )
            .unwrap();
        assert_eq!(tables.len(), 1);

        conn.execute_statement("DROP TABLE t", &[]).unwrap();
        assert!(conn.execute_statement("WRONG SQL", &[]).is_err());
    }
}
