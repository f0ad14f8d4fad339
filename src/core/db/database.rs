/// Database Facade
///
/// `Database` ties together the three collaborators a query needs: the
/// connection that runs SQL, the grammar that writes it and the prefixer
/// that maps logical table names to physical ones. It hands out `Query`
/// values and runs raw, hand-written SQL.
///
/// Cloning a `Database` is cheap; the connection and the grammar are shared.

use crate::config::DatabaseConfig;
use crate::core::db::connection::{Connection, ImportSource, SqliteConnection};
use crate::core::db::query::Query;
use crate::core::error::{perform, Result};
use crate::core::value::{Row, Value};
use crate::grammar::{Grammar, SqlGrammar};
use crate::intent::{Builder, QuerySpec, Raw};
use crate::prefixer::TablePrefixer;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<dyn Connection>,
    grammar: Arc<dyn Grammar>,
    prefixer: TablePrefixer,
}

impl Database {
    /// Wires a database from its collaborators
    pub fn new(connection: Arc<dyn Connection>, grammar: Arc<dyn Grammar>, prefixer: TablePrefixer) -> Self {
        Database {
            connection,
            grammar,
            prefixer,
        }
    }

    /// Opens the configured SQLite database
    ///
    /// # Arguments
    ///
    /// * `config` - DSN, dialect and table prefix
    ///
    /// # Returns
    ///
    /// A database using `SqlGrammar` for the configured dialect, or an
    /// `Error::Database` when the connection can't be opened.
    ///
    /// # Example
    ///
    /// ```
    /// use minidb::{Database, DatabaseConfig};
    ///
    /// let database = Database::create(&DatabaseConfig::memory()).unwrap();
    /// database.statement("CREATE TABLE items (name TEXT)", &[]).unwrap();
    /// ```
    pub fn create(config: &DatabaseConfig) -> Result<Self> {
        let options = config.sqlite.clone().unwrap_or_default();
        let connection = perform(|| SqliteConnection::open_with_options(&config.dsn, &options))?;
        let dialect = config.dialect();
        info!(dialect = %dialect, prefix = config.table_prefix(), "Database created");

        Ok(Database::new(
            Arc::new(connection),
            Arc::new(SqlGrammar::new(dialect)),
            TablePrefixer::new(config.table_prefix()),
        ))
    }

    /// A query with no table set yet
    pub fn builder(&self) -> Query {
        Query::new(self.clone(), QuerySpec::new())
    }

    /// A query over the given logical table
    pub fn table(&self, name: impl Into<String>) -> Query {
        self.builder().table(name)
    }

    pub fn table_as(&self, name: impl Into<String>, alias: impl Into<String>) -> Query {
        self.builder().table_as(name, alias)
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    pub fn table_prefixer(&self) -> &TablePrefixer {
        &self.prefixer
    }

    /// A database sharing this one's connection and grammar with the given prefix instead
    pub fn with_table_prefix(&self, prefix: impl Into<String>) -> Self {
        Database {
            connection: Arc::clone(&self.connection),
            grammar: Arc::clone(&self.grammar),
            prefixer: TablePrefixer::new(prefix),
        }
    }

    /// Like `with_table_prefix`, with `prefix` put in front of the current prefix
    pub fn with_tables_prefixed(&self, prefix: &str) -> Self {
        self.with_table_prefix(format!("{}{}", prefix, self.prefixer.prefix()))
    }

    // ---- raw SQL; no prefixing ----

    pub fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>> {
        perform(|| self.connection.select_rows(sql, bindings))
    }

    pub fn select_first(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>> {
        perform(|| self.connection.select_one_row(sql, bindings))
    }

    pub fn insert(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        perform(|| self.connection.execute_write(sql, bindings))
    }

    pub fn insert_get_id(&self, sql: &str, bindings: &[Value], sequence: Option<&str>) -> Result<i64> {
        perform(|| self.connection.execute_write_returning_id(sql, bindings, sequence))
    }

    pub fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        perform(|| self.connection.execute_write(sql, bindings))
    }

    pub fn delete(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        perform(|| self.connection.execute_write(sql, bindings))
    }

    /// Runs one statement of any kind
    pub fn statement(&self, sql: &str, bindings: &[Value]) -> Result<()> {
        perform(|| self.connection.execute_statement(sql, bindings))
    }

    /// Runs a block of semicolon-separated statements without bindings
    pub fn statements(&self, sql: &str) -> Result<()> {
        perform(|| self.connection.execute_multi_statement(sql))
    }

    /// Runs the statements read from a file path or a reader
    pub fn import(&self, source: impl Into<ImportSource>) -> Result<()> {
        let source = source.into();
        perform(|| self.connection.import_from_source(source))
    }

    // ---- helpers ----

    pub fn add_table_prefix(&self, table: &str) -> String {
        self.prefixer.add_table_prefix(table)
    }

    pub fn add_table_prefix_to_column(&self, column: &str) -> String {
        self.prefixer.add_table_prefix_to_column(column)
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        self.grammar.quote_identifier(name)
    }

    pub fn quote_composite_identifier(&self, name: &str) -> String {
        self.grammar.quote_composite_identifier(name)
    }

    /// Escapes LIKE wildcards so a value matches literally
    pub fn escape_like_wildcards(&self, value: &str) -> String {
        self.grammar.escape_like_wildcards(value)
    }

    /// Builds a raw SQL fragment for use in queries
    pub fn raw(&self, sql: impl Into<String>, bindings: Vec<Value>) -> Raw {
        Raw::new(sql, bindings)
    }
}
