/// Table Prefixer
///
/// Rewrites logical table names to physical ones by prepending a fixed
/// prefix. Only the table segment of a dotted reference is touched:
/// `db.items` becomes `db.pre_items`, `items.name` becomes `pre_items.name`
/// and a bare column such as `name` is left alone.
///
/// Qualifiers that name an alias declared by the query (or by an enclosing
/// query) are aliases, not tables, and stay unprefixed. Raw SQL fragments
/// are never rewritten.
use crate::intent::{Condition, Criterion, Expr, InValues, Insert, InsertSource, Join, QuerySpec, TableSource};

/// Applies a table prefix to names and to whole query intents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePrefixer {
    prefix: String,
}

impl TablePrefixer {
    pub fn new(prefix: impl Into<String>) -> Self {
        TablePrefixer { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefixes a table name, database-qualified or not
    ///
    /// # Arguments
    ///
    /// * `table` - `items` or `db.items`
    ///
    /// # Returns
    ///
    /// `pre_items` or `db.pre_items`
    pub fn add_table_prefix(&self, table: &str) -> String {
        match table.rfind('.') {
            Some(dot) => format!("{}{}{}", &table[..=dot], self.prefix, &table[dot + 1..]),
            None => format!("{}{}", self.prefix, table),
        }
    }

    /// Prefixes the table qualifier of a column reference
    ///
    /// `name` stays `name`, `items.name` becomes `pre_items.name` and
    /// `db.items.name` becomes `db.pre_items.name`.
    pub fn add_table_prefix_to_column(&self, column: &str) -> String {
        match column.rfind('.') {
            Some(dot) => format!("{}.{}", self.add_table_prefix(&column[..dot]), &column[dot + 1..]),
            None => column.to_string(),
        }
    }

    /// Returns a copy of the intent with every table reference prefixed.
    ///
    /// The input is never modified.
    pub fn process(&self, spec: &QuerySpec) -> QuerySpec {
        let mut processed = spec.clone();
        if !self.prefix.is_empty() {
            self.process_spec(&mut processed, &[]);
        }
        processed
    }

    fn process_spec(&self, spec: &mut QuerySpec, outer_aliases: &[String]) {
        let mut aliases: Vec<String> = outer_aliases.to_vec();
        aliases.extend(spec.declared_aliases().map(String::from));

        if let Some(table) = &mut spec.table {
            self.process_table(table, &aliases);
        }
        for item in &mut spec.select {
            self.process_expr(&mut item.expr, &aliases);
        }
        for join in &mut spec.joins {
            self.process_join(join, &aliases);
        }
        self.process_criteria(&mut spec.criteria, &aliases);
        for expr in &mut spec.group_by {
            self.process_expr(expr, &aliases);
        }
        for order in &mut spec.order_by {
            self.process_expr(&mut order.expr, &aliases);
        }

        match &mut spec.insert {
            Some(Insert::Rows(rows)) => {
                for row in rows.iter_mut() {
                    *row = row
                        .drain(..)
                        .map(|(column, mut value)| {
                            self.process_expr(&mut value, &aliases);
                            (self.process_column(&column, &aliases), value)
                        })
                        .collect();
                }
            }
            Some(Insert::FromSelect { columns, source }) => {
                if let Some(columns) = columns {
                    for column in columns.iter_mut() {
                        *column = self.process_column(column, &aliases);
                    }
                }
                if let InsertSource::Query(query) = source {
                    self.process_spec(query, &aliases);
                }
            }
            None => {}
        }

        if !spec.update.is_empty() {
            spec.update = spec
                .update
                .drain(..)
                .map(|(column, mut value)| {
                    self.process_expr(&mut value, &aliases);
                    (self.process_column(&column, &aliases), value)
                })
                .collect();
        }
    }

    fn process_table(&self, table: &mut TableSource, aliases: &[String]) {
        match table {
            TableSource::Name(name) => *name = self.add_table_prefix(name),
            TableSource::SubQuery(query) => self.process_spec(query, aliases),
            TableSource::Raw(_) => {}
        }
    }

    fn process_join(&self, join: &mut Join, aliases: &[String]) {
        self.process_table(&mut join.table, aliases);
        self.process_criteria(&mut join.on, aliases);
    }

    fn process_criteria(&self, criteria: &mut [Criterion], aliases: &[String]) {
        for criterion in criteria {
            self.process_condition(&mut criterion.condition, aliases);
        }
    }

    fn process_condition(&self, condition: &mut Condition, aliases: &[String]) {
        match condition {
            Condition::Compare { left, right, .. } => {
                self.process_expr(left, aliases);
                self.process_expr(right, aliases);
            }
            Condition::Null { operand, .. } => self.process_expr(operand, aliases),
            Condition::In { operand, values, .. } => {
                self.process_expr(operand, aliases);
                match values {
                    InValues::List(list) => {
                        for value in list {
                            self.process_expr(value, aliases);
                        }
                    }
                    InValues::SubQuery(query) => self.process_spec(query, aliases),
                }
            }
            Condition::Between { operand, low, high, .. } => {
                self.process_expr(operand, aliases);
                self.process_expr(low, aliases);
                self.process_expr(high, aliases);
            }
            Condition::Exists { query, .. } => self.process_spec(query, aliases),
            Condition::Raw(_) => {}
            Condition::Group(criteria) => self.process_criteria(criteria, aliases),
        }
    }

    fn process_expr(&self, expr: &mut Expr, aliases: &[String]) {
        match expr {
            Expr::Column(column) => *column = self.process_column(column, aliases),
            Expr::SubQuery(query) => self.process_spec(query, aliases),
            Expr::Aggregate { argument, .. } => self.process_expr(argument, aliases),
            Expr::Value(_) | Expr::Raw(_) => {}
        }
    }

    fn process_column(&self, column: &str, aliases: &[String]) -> String {
        match column.rfind('.') {
            Some(dot) if aliases.iter().any(|alias| alias == &column[..dot]) => column.to_string(),
            _ => self.add_table_prefix_to_column(column),
        }
    }
}
