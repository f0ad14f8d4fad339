/// Query Execution Module
///
/// This module provides `Query`, a query intent bound to the `Database` it
/// runs against, and its terminal operations (`get`, `first`, aggregates,
/// `chunk`, inserts, `update` and `delete`).
///
/// Every terminal operation works on a copy of the intent: prefix it,
/// compile it, run the statements, and normalize whatever failed exactly
/// once on the way out. The caller's `Query` is never modified, so a
/// `Query` can be reused as a template.
use crate::core::db::database::Database;
use crate::core::error::{perform, Error, Result, UpstreamError};
use crate::core::value::{Row, Value};
use crate::grammar::CompiledStatement;
use crate::intent::{
    AggregateFunction, Builder, Expr, Insert, InsertSource, OperationKind, QuerySpec, Raw, SelectItem, ValueMap,
};
use tracing::debug;

/// Alias of the single column an aggregate query selects
pub const AGGREGATE_ALIAS: &str = "aggregate";

type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// A query intent bound to a database
#[derive(Debug, Clone)]
pub struct Query {
    database: Database,
    spec: QuerySpec,
}

impl Builder for Query {
    fn spec_mut(&mut self) -> &mut QuerySpec {
        &mut self.spec
    }
}

impl Query {
    /// Creates a query over the given intent
    pub fn new(database: Database, spec: QuerySpec) -> Self {
        Query { database, spec }
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Fetches every row the query selects
    ///
    /// # Returns
    ///
    /// The rows in the order the database produced them; empty when nothing matches.
    pub fn get(&self) -> Result<Vec<Row>> {
        perform(|| self.fetch_rows(&self.spec))
    }

    /// Fetches the first row the query selects, if any
    pub fn first(&self) -> Result<Option<Row>> {
        let mut spec = self.spec.clone();
        spec.limit = Some(1);
        perform(|| self.fetch_one(&spec))
    }

    /// Counts the matching rows
    pub fn count(&self) -> Result<i64> {
        self.count_column("*")
    }

    /// Counts the matching rows where `column` is not NULL
    pub fn count_column(&self, column: &str) -> Result<i64> {
        let value = perform(|| self.aggregate(AggregateFunction::Count, column))?;
        Ok(value.and_then(|value| value.as_i64()).unwrap_or(0))
    }

    /// Average of `column` over the matching rows; `None` when no row matches
    pub fn avg(&self, column: &str) -> Result<Option<Value>> {
        perform(|| self.aggregate(AggregateFunction::Avg, column))
    }

    pub fn sum(&self, column: &str) -> Result<Option<Value>> {
        perform(|| self.aggregate(AggregateFunction::Sum, column))
    }

    pub fn min(&self, column: &str) -> Result<Option<Value>> {
        perform(|| self.aggregate(AggregateFunction::Min, column))
    }

    pub fn max(&self, column: &str) -> Result<Option<Value>> {
        perform(|| self.aggregate(AggregateFunction::Max, column))
    }

    /// Walks the matching rows in batches of `size` rows
    ///
    /// # Arguments
    ///
    /// * `size` - Rows per batch; must be greater than zero
    /// * `callback` - Called once for every non-empty batch
    ///
    /// # Returns
    ///
    /// `Error::InvalidArgument` for a non-positive size, before any query runs.
    /// Iteration stops after an empty batch or after a batch shorter than `size`.
    pub fn chunk<F>(&self, size: i64, mut callback: F) -> Result<()>
    where
        F: FnMut(Vec<Row>),
    {
        if size <= 0 {
            return Err(Error::invalid_argument("Chunk size must be greater than zero"));
        }
        let size = size as u64;

        let mut spec = self.spec.clone();
        spec.limit = Some(size);
        let mut offset = 0;

        loop {
            spec.offset = Some(offset);
            debug!(offset, size, "fetching chunk");
            let rows = perform(|| self.fetch_rows(&spec))?;
            let fetched = rows.len() as u64;
            if fetched == 0 {
                break;
            }
            callback(rows);
            if fetched < size {
                break;
            }
            offset += size;
        }
        Ok(())
    }

    /// Inserts rows into the query table
    ///
    /// # Returns
    ///
    /// The total number of inserted rows over all the statements the grammar produced.
    pub fn insert<I>(&self, rows: I) -> Result<u64>
    where
        I: IntoIterator<Item = ValueMap>,
    {
        let mut spec = self.spec.clone();
        spec.kind = OperationKind::Insert;
        spec.insert = Some(Insert::Rows(rows.into_iter().collect()));
        perform(|| self.run_insert(&spec))
    }

    /// Inserts one row and returns its generated identifier
    ///
    /// `sequence` names the sequence object on databases that use them; it
    /// is ignored by SQLite.
    pub fn insert_get_id(&self, row: ValueMap, sequence: Option<&str>) -> Result<Option<i64>> {
        let mut spec = self.spec.clone();
        spec.kind = OperationKind::Insert;
        spec.insert = Some(Insert::Rows(vec![row]));
        perform(|| {
            let mut id = None;
            for statement in self.compile_insert(&spec)? {
                id = Some(self.database.connection().execute_write_returning_id(
                    &statement.sql,
                    &statement.bindings,
                    sequence,
                )?);
            }
            Ok::<_, UpstreamError>(id)
        })
    }

    /// Inserts the rows another query selects
    ///
    /// An empty `columns` list inserts into the columns in table order.
    pub fn insert_from_select<S>(&self, columns: &[&str], source: S) -> Result<u64>
    where
        S: Into<InsertSource>,
    {
        let mut spec = self.spec.clone();
        spec.kind = OperationKind::InsertFromSelect;
        spec.insert = Some(Insert::FromSelect {
            columns: if columns.is_empty() {
                None
            } else {
                Some(columns.iter().map(|column| column.to_string()).collect())
            },
            source: source.into(),
        });
        perform(|| self.run_insert(&spec))
    }

    /// Updates the matching rows and returns how many were affected
    pub fn update(&self, values: ValueMap) -> Result<u64> {
        let mut spec = self.spec.clone();
        spec.kind = OperationKind::Update;
        spec.update = values;
        perform(|| {
            let statement = self
                .database
                .grammar()
                .compile_update(&self.database.table_prefixer().process(&spec))?;
            self.execute_write(&statement)
        })
    }

    /// Deletes the matching rows and returns how many were affected
    pub fn delete(&self) -> Result<u64> {
        let mut spec = self.spec.clone();
        spec.kind = OperationKind::Delete;
        perform(|| {
            let statement = self
                .database
                .grammar()
                .compile_delete(&self.database.table_prefixer().process(&spec))?;
            self.execute_write(&statement)
        })
    }

    // ---- helpers shared with Database ----

    pub fn add_table_prefix(&self, table: &str) -> String {
        self.database.add_table_prefix(table)
    }

    pub fn add_table_prefix_to_column(&self, column: &str) -> String {
        self.database.add_table_prefix_to_column(column)
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        self.database.quote_identifier(name)
    }

    pub fn quote_composite_identifier(&self, name: &str) -> String {
        self.database.quote_composite_identifier(name)
    }

    pub fn escape_like_wildcards(&self, value: &str) -> String {
        self.database.escape_like_wildcards(value)
    }

    pub fn raw(&self, sql: impl Into<String>, bindings: Vec<Value>) -> Raw {
        Raw::new(sql, bindings)
    }

    // ---- internals; errors stay upstream until the public boundary ----

    fn fetch_rows(&self, spec: &QuerySpec) -> UpstreamResult<Vec<Row>> {
        let statement = self.compile_select(spec)?;
        Ok(self
            .database
            .connection()
            .select_rows(&statement.sql, &statement.bindings)?)
    }

    fn fetch_one(&self, spec: &QuerySpec) -> UpstreamResult<Option<Row>> {
        let statement = self.compile_select(spec)?;
        Ok(self
            .database
            .connection()
            .select_one_row(&statement.sql, &statement.bindings)?)
    }

    fn compile_select(&self, spec: &QuerySpec) -> UpstreamResult<CompiledStatement> {
        let processed = self.database.table_prefixer().process(spec);
        Ok(self.database.grammar().compile_select(&processed)?)
    }

    fn compile_insert(&self, spec: &QuerySpec) -> UpstreamResult<Vec<CompiledStatement>> {
        let processed = self.database.table_prefixer().process(spec);
        Ok(self.database.grammar().compile_insert(&processed)?)
    }

    fn execute_write(&self, statement: &CompiledStatement) -> UpstreamResult<u64> {
        Ok(self
            .database
            .connection()
            .execute_write(&statement.sql, &statement.bindings)?)
    }

    fn run_insert(&self, spec: &QuerySpec) -> UpstreamResult<u64> {
        let mut inserted = 0;
        for statement in self.compile_insert(spec)? {
            inserted += self.execute_write(&statement)?;
        }
        Ok(inserted)
    }

    /// Reads one aggregate over the matching rows.
    ///
    /// The select list, limit, offset and order are dropped from the working
    /// copy; grouping is kept, in which case the first group's value is read.
    fn aggregate(&self, function: AggregateFunction, column: &str) -> UpstreamResult<Option<Value>> {
        let mut spec = self.spec.clone();
        spec.select = vec![SelectItem {
            expr: Expr::aggregate(function, Expr::column(column)),
            alias: Some(AGGREGATE_ALIAS.to_string()),
        }];
        spec.limit = None;
        spec.offset = None;
        spec.order_by.clear();

        let row = self.fetch_one(&spec)?;
        Ok(row
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
            .filter(|value| !value.is_null()))
    }
}
