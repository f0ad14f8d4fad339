/// SQL Grammar
///
/// The built-in `Grammar`: compiles query intents to SQL for the common
/// ANSI dialect, SQLite and MySQL. Literal values always become `?`
/// placeholders; `LIMIT` and `OFFSET` counts are written inline.
use super::{CompileError, CompileResult, CompiledStatement, Dialect, Grammar};
use crate::core::value::Value;
use crate::intent::{
    Condition, Conjunction, Criterion, Direction, Expr, InValues, Insert, InsertSource, Join, JoinKind, Order, QuerySpec,
    TableSource, ValueMap,
};
use once_cell::sync::Lazy;
use regex::Regex;

static COMPARISON_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(=|!=|<>|<=|>=|<|>|(not\s+)?like)$").expect("valid comparison operator pattern")
});

/// Placeholder limit of the bundled SQLite (`SQLITE_MAX_VARIABLE_NUMBER`)
const SQLITE_MAX_VARIABLES: usize = 32766;

/// Grammar for the built-in dialects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlGrammar {
    dialect: Dialect,
}

impl SqlGrammar {
    pub fn new(dialect: Dialect) -> Self {
        SqlGrammar { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote_char(&self) -> char {
        match self.dialect {
            Dialect::MySql => '`',
            Dialect::Common | Dialect::Sqlite => '"',
        }
    }

    fn compilation(&self) -> Compilation<'_> {
        Compilation {
            grammar: self,
            bindings: Vec::new(),
        }
    }

    /// The target table of a write statement
    fn write_target<'s>(&self, spec: &'s QuerySpec, statement: &str) -> CompileResult<&'s str> {
        match &spec.table {
            Some(TableSource::Name(name)) => Ok(name.as_str()),
            Some(_) => Err(CompileError::InvalidQuery(format!(
                "{} statements need a table name, not a derived table",
                statement
            ))),
            None => Err(CompileError::InvalidQuery(format!(
                "The table of the {} statement is not set",
                statement
            ))),
        }
    }
}

impl Grammar for SqlGrammar {
    fn compile_select(&self, spec: &QuerySpec) -> CompileResult<CompiledStatement> {
        let mut compilation = self.compilation();
        let sql = compilation.select(spec)?;
        Ok(compilation.finish(sql))
    }

    fn compile_insert(&self, spec: &QuerySpec) -> CompileResult<Vec<CompiledStatement>> {
        let table = self.quote_composite_identifier(self.write_target(spec, "INSERT")?);

        match &spec.insert {
            None => Err(CompileError::InvalidQuery("Nothing to insert".to_string())),
            Some(Insert::Rows(rows)) if rows.is_empty() => Ok(Vec::new()),
            Some(Insert::Rows(rows)) => match self.dialect {
                Dialect::Sqlite => {
                    let mut statements = Vec::new();
                    for run in rows_by_column_set(rows) {
                        let rows_per_statement = (SQLITE_MAX_VARIABLES / run[0].len().max(1)).max(1);
                        for batch in run.chunks(rows_per_statement) {
                            statements.extend(self.insert_rows(&table, batch)?);
                        }
                    }
                    Ok(statements)
                }
                Dialect::Common | Dialect::MySql => {
                    let all: Vec<&ValueMap> = rows.iter().collect();
                    self.insert_rows(&table, &all)
                }
            },
            Some(Insert::FromSelect { columns, source }) => {
                let mut compilation = self.compilation();
                let mut sql = format!("INSERT INTO {}", table);
                if let Some(columns) = columns {
                    let columns = columns
                        .iter()
                        .map(|column| compilation.column(column))
                        .collect::<CompileResult<Vec<_>>>()?;
                    sql.push_str(&format!(" ({})", columns.join(", ")));
                }
                sql.push(' ');
                match source {
                    InsertSource::Query(query) => sql.push_str(&compilation.select(query)?),
                    InsertSource::Raw(raw) => sql.push_str(&compilation.raw(&raw.sql, &raw.bindings)),
                }
                Ok(vec![compilation.finish(sql)])
            }
        }
    }

    fn compile_update(&self, spec: &QuerySpec) -> CompileResult<CompiledStatement> {
        let table = self.write_target(spec, "UPDATE")?;
        if !spec.joins.is_empty() {
            return Err(CompileError::InvalidQuery(
                "Joins are not supported in UPDATE statements".to_string(),
            ));
        }
        if spec.update.is_empty() {
            return Err(CompileError::InvalidQuery("Nothing to update".to_string()));
        }

        let mut compilation = self.compilation();
        let mut sql = format!("UPDATE {}", compilation.table_name(table, spec.alias.as_deref()));

        let mut assignments = Vec::with_capacity(spec.update.len());
        for (column, value) in &spec.update {
            assignments.push(format!("{} = {}", compilation.column(column)?, compilation.expr(value)?));
        }
        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));

        compilation.where_clause(&spec.criteria, &mut sql)?;
        compilation.modification_tail(spec, &mut sql)?;
        Ok(compilation.finish(sql))
    }

    fn compile_delete(&self, spec: &QuerySpec) -> CompileResult<CompiledStatement> {
        let table = self.write_target(spec, "DELETE")?;
        if !spec.joins.is_empty() {
            return Err(CompileError::InvalidQuery(
                "Joins are not supported in DELETE statements".to_string(),
            ));
        }

        let mut compilation = self.compilation();
        let mut sql = format!("DELETE FROM {}", compilation.table_name(table, spec.alias.as_deref()));
        compilation.where_clause(&spec.criteria, &mut sql)?;
        compilation.modification_tail(spec, &mut sql)?;
        Ok(compilation.finish(sql))
    }

    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.quote_char();
        let escaped = name.replace(quote, &format!("{}{}", quote, quote));
        format!("{}{}{}", quote, escaped, quote)
    }

    fn quote_composite_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|segment| {
                if segment == "*" {
                    segment.to_string()
                } else {
                    self.quote_identifier(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn escape_like_wildcards(&self, value: &str) -> String {
        value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
    }
}

impl SqlGrammar {
    /// Compiles rows into insert statements over the union of their columns.
    ///
    /// Rows without any column can't share a column list, so they become
    /// `DEFAULT VALUES` statements of their own (a single `() VALUES ()`
    /// statement on MySQL).
    fn insert_rows(&self, table: &str, rows: &[&ValueMap]) -> CompileResult<Vec<CompiledStatement>> {
        let mut columns: Vec<&String> = Vec::new();
        for row in rows {
            for column in row.keys() {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }

        if columns.is_empty() {
            return Ok(match self.dialect {
                Dialect::MySql => {
                    let values = vec!["()"; rows.len()].join(", ");
                    vec![CompiledStatement::new(format!("INSERT INTO {} () VALUES {}", table, values), Vec::new())]
                }
                Dialect::Common | Dialect::Sqlite => rows
                    .iter()
                    .map(|_| CompiledStatement::new(format!("INSERT INTO {} DEFAULT VALUES", table), Vec::new()))
                    .collect(),
            });
        }

        let mut compilation = self.compilation();
        let quoted = columns
            .iter()
            .map(|column| compilation.column(column))
            .collect::<CompileResult<Vec<_>>>()?;

        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                values.push(match row.get(*column) {
                    Some(value) => compilation.expr(value)?,
                    None => "DEFAULT".to_string(),
                });
            }
            tuples.push(format!("({})", values.join(", ")));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            quoted.join(", "),
            tuples.join(", ")
        );
        Ok(vec![compilation.finish(sql)])
    }
}

/// Splits rows into runs of consecutive rows with the same column list.
fn rows_by_column_set(rows: &[ValueMap]) -> Vec<Vec<&ValueMap>> {
    let mut groups: Vec<Vec<&ValueMap>> = Vec::new();
    for row in rows {
        match groups.last_mut() {
            Some(group) if group[0].keys().eq(row.keys()) => group.push(row),
            _ => groups.push(vec![row]),
        }
    }
    groups
}

/// One statement being compiled; collects bindings in placeholder order.
struct Compilation<'g> {
    grammar: &'g SqlGrammar,
    bindings: Vec<Value>,
}

impl Compilation<'_> {
    fn finish(self, sql: String) -> CompiledStatement {
        CompiledStatement::new(sql, self.bindings)
    }

    fn bind(&mut self, value: &Value) -> String {
        self.bindings.push(value.clone());
        "?".to_string()
    }

    fn raw(&mut self, sql: &str, bindings: &[Value]) -> String {
        self.bindings.extend_from_slice(bindings);
        sql.to_string()
    }

    fn column(&self, name: &str) -> CompileResult<String> {
        if name.trim().is_empty() {
            return Err(CompileError::InvalidArgument("Column name must not be empty".to_string()));
        }
        Ok(self.grammar.quote_composite_identifier(name))
    }

    fn table_name(&self, name: &str, alias: Option<&str>) -> String {
        let mut sql = self.grammar.quote_composite_identifier(name);
        if let Some(alias) = alias {
            sql.push_str(" AS ");
            sql.push_str(&self.grammar.quote_identifier(alias));
        }
        sql
    }

    fn select(&mut self, spec: &QuerySpec) -> CompileResult<String> {
        let table = spec
            .table
            .as_ref()
            .ok_or_else(|| CompileError::InvalidQuery("The table to select from is not set".to_string()))?;

        let columns = if spec.select.is_empty() {
            "*".to_string()
        } else {
            let mut items = Vec::with_capacity(spec.select.len());
            for item in &spec.select {
                let mut sql = self.expr(&item.expr)?;
                if let Some(alias) = &item.alias {
                    sql.push_str(" AS ");
                    sql.push_str(&self.grammar.quote_identifier(alias));
                }
                items.push(sql);
            }
            items.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, self.table_source(table, spec.alias.as_deref())?);
        for join in &spec.joins {
            sql.push(' ');
            sql.push_str(&self.join(join)?);
        }
        self.where_clause(&spec.criteria, &mut sql)?;

        if !spec.group_by.is_empty() {
            let groups = spec
                .group_by
                .iter()
                .map(|expr| self.expr(expr))
                .collect::<CompileResult<Vec<_>>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }
        self.order_clause(&spec.order_by, &mut sql)?;

        match (spec.limit, spec.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(_)) => {
                return Err(CompileError::InvalidQuery(
                    "An offset can't be applied without a limit".to_string(),
                ))
            }
            (None, None) => {}
        }
        Ok(sql)
    }

    fn table_source(&mut self, source: &TableSource, alias: Option<&str>) -> CompileResult<String> {
        let mut sql = match source {
            TableSource::Name(name) => return Ok(self.table_name(name, alias)),
            TableSource::SubQuery(query) => format!("({})", self.select(query)?),
            TableSource::Raw(raw) => self.raw(&raw.sql, &raw.bindings),
        };
        if let Some(alias) = alias {
            sql.push_str(" AS ");
            sql.push_str(&self.grammar.quote_identifier(alias));
        }
        Ok(sql)
    }

    fn join(&mut self, join: &Join) -> CompileResult<String> {
        let keyword = match join.kind {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        };
        let mut sql = format!("{} {}", keyword, self.table_source(&join.table, join.alias.as_deref())?);
        if !join.on.is_empty() {
            sql.push_str(" ON ");
            sql.push_str(&self.criteria(&join.on)?);
        }
        Ok(sql)
    }

    fn where_clause(&mut self, criteria: &[Criterion], sql: &mut String) -> CompileResult<()> {
        if !criteria.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.criteria(criteria)?);
        }
        Ok(())
    }

    fn order_clause(&mut self, orders: &[Order], sql: &mut String) -> CompileResult<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let mut items = Vec::with_capacity(orders.len());
        for order in orders {
            let mut item = self.expr(&order.expr)?;
            match order.direction {
                Some(Direction::Asc) => item.push_str(" ASC"),
                Some(Direction::Desc) => item.push_str(" DESC"),
                None => {}
            }
            items.push(item);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&items.join(", "));
        Ok(())
    }

    /// ORDER BY and LIMIT of UPDATE and DELETE statements; MySQL only.
    fn modification_tail(&mut self, spec: &QuerySpec, sql: &mut String) -> CompileResult<()> {
        if spec.offset.is_some() {
            return Err(CompileError::InvalidQuery(
                "OFFSET is not supported in UPDATE and DELETE statements".to_string(),
            ));
        }
        if spec.order_by.is_empty() && spec.limit.is_none() {
            return Ok(());
        }
        if self.grammar.dialect != Dialect::MySql {
            return Err(CompileError::InvalidQuery(format!(
                "ORDER BY and LIMIT in UPDATE and DELETE statements are not supported by the {} dialect",
                self.grammar.dialect
            )));
        }
        self.order_clause(&spec.order_by, sql)?;
        if let Some(limit) = spec.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(())
    }

    fn criteria(&mut self, criteria: &[Criterion]) -> CompileResult<String> {
        let mut sql = String::new();
        for (index, criterion) in criteria.iter().enumerate() {
            if index > 0 {
                sql.push_str(match criterion.conjunction {
                    Conjunction::And => " AND ",
                    Conjunction::Or => " OR ",
                });
            }
            sql.push_str(&self.condition(&criterion.condition)?);
        }
        Ok(sql)
    }

    fn condition(&mut self, condition: &Condition) -> CompileResult<String> {
        match condition {
            Condition::Compare { left, operator, right } => {
                let operator = self.operator(operator)?;
                let mut sql = format!("{} {} {}", self.expr(left)?, operator, self.expr(right)?);
                if operator.ends_with("LIKE") && self.grammar.dialect != Dialect::MySql {
                    sql.push_str(" ESCAPE '\\'");
                }
                Ok(sql)
            }
            Condition::Null { operand, negated } => Ok(format!(
                "{} IS {}NULL",
                self.expr(operand)?,
                if *negated { "NOT " } else { "" }
            )),
            Condition::In { operand, values, negated } => {
                let not = if *negated { "NOT " } else { "" };
                match values {
                    // Nothing is in an empty set
                    InValues::List(list) if list.is_empty() => {
                        Ok(if *negated { "1 = 1" } else { "0 = 1" }.to_string())
                    }
                    InValues::List(list) => {
                        let operand = self.expr(operand)?;
                        let items = list
                            .iter()
                            .map(|value| self.expr(value))
                            .collect::<CompileResult<Vec<_>>>()?;
                        Ok(format!("{} {}IN ({})", operand, not, items.join(", ")))
                    }
                    InValues::SubQuery(query) => {
                        let operand = self.expr(operand)?;
                        Ok(format!("{} {}IN {}", operand, not, self.scalar_sub(query)?))
                    }
                }
            }
            Condition::Between {
                operand,
                low,
                high,
                negated,
            } => Ok(format!(
                "{} {}BETWEEN {} AND {}",
                self.expr(operand)?,
                if *negated { "NOT " } else { "" },
                self.expr(low)?,
                self.expr(high)?
            )),
            Condition::Exists { query, negated } => Ok(format!(
                "{}EXISTS ({})",
                if *negated { "NOT " } else { "" },
                self.select(query)?
            )),
            Condition::Raw(raw) => Ok(format!("({})", self.raw(&raw.sql, &raw.bindings))),
            Condition::Group(criteria) => {
                if criteria.is_empty() {
                    return Err(CompileError::InvalidReturnValue(
                        "A where group must add at least one criterion".to_string(),
                    ));
                }
                Ok(format!("({})", self.criteria(criteria)?))
            }
        }
    }

    fn operator(&self, operator: &str) -> CompileResult<String> {
        let normalized = operator.split_whitespace().collect::<Vec<_>>().join(" ");
        if COMPARISON_OPERATOR.is_match(&normalized) {
            Ok(normalized.to_uppercase())
        } else {
            Err(CompileError::InvalidArgument(format!(
                "Unknown comparison operator `{}`",
                operator
            )))
        }
    }

    fn expr(&mut self, expr: &Expr) -> CompileResult<String> {
        match expr {
            Expr::Column(name) => self.column(name),
            Expr::Value(value) => Ok(self.bind(value)),
            Expr::Raw(raw) => Ok(self.raw(&raw.sql, &raw.bindings)),
            Expr::SubQuery(query) => self.scalar_sub(query),
            Expr::Aggregate { function, argument } => {
                Ok(format!("{}({})", function.as_sql(), self.expr(argument)?))
            }
        }
    }

    /// A parenthesized sub-query that must yield a single column
    fn scalar_sub(&mut self, query: &QuerySpec) -> CompileResult<String> {
        if query.select.len() > 1 {
            return Err(CompileError::InvalidReturnValue(format!(
                "A sub-query used as a value must select one column, {} selected",
                query.select.len()
            )));
        }
        Ok(format!("({})", self.select(query)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Builder, Raw};
    use crate::values;
    use insta::assert_snapshot;

    fn sqlite() -> SqlGrammar {
        SqlGrammar::new(Dialect::Sqlite)
    }

    fn insert_spec(rows: Vec<ValueMap>) -> QuerySpec {
        let mut spec = QuerySpec::new().table("items");
        spec.insert = Some(Insert::Rows(rows));
        spec
    }

    #[test]
    fn test_quoting() {
        let grammar = sqlite();
        assert_eq!(grammar.quote_identifier("sub\"name"), r#""sub""name""#);
        assert_eq!(grammar.quote_identifier("*"), r#""*""#);
        assert_eq!(grammar.quote_composite_identifier("table.*"), r#""table".*"#);
        assert_eq!(grammar.quote_composite_identifier("db.items.name"), r#""db"."items"."name""#);

        let mysql = SqlGrammar::new(Dialect::MySql);
        assert_eq!(mysql.quote_composite_identifier("items.na`me"), "`items`.`na``me`");
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(sqlite().escape_like_wildcards(r"100%_a\b"), r"100\%\_a\\b");
    }

    #[test]
    fn test_compile_select() {
        let spec = QuerySpec::new()
            .table_as("items", "i")
            .select(["i.id", "i.name"])
            .left_join_as("owners", "o", "o.id", "=", "i.owner_id")
            .where_("i.value", ">", 10)
            .where_group(|q| q.where_("i.name", "like", "B%").or_where_null("o.id"))
            .where_in("i.id", [1, 2, 3])
            .order_by("i.name", Direction::Desc)
            .limit(10)
            .offset(20);

        let statement = sqlite().compile_select(&spec).unwrap();
        assert_snapshot!(
            statement.sql,
            @r#"SELECT "i"."id", "i"."name" FROM "items" AS "i" LEFT JOIN "owners" AS "o" ON "o"."id" = "i"."owner_id" WHERE "i"."value" > ? AND ("i"."name" LIKE ? ESCAPE '\' OR "o"."id" IS NULL) AND "i"."id" IN (?, ?, ?) ORDER BY "i"."name" DESC LIMIT 10 OFFSET 20"#
        );
        assert_eq!(
            statement.bindings,
            vec![Value::from(10), Value::from("B%"), Value::from(1), Value::from(2), Value::from(3)]
        );
    }

    #[test]
    fn test_bindings_follow_placeholder_order() {
        let spec = QuerySpec::new()
            .table("items")
            .add_select_raw("? AS marker", vec![Value::from("m")])
            .add_select_sub(|q| q.table("owners").add_count("*", None).where_("owners.id", ">", 5), "owners")
            .where_between("value", 1, 9)
            .where_raw("name <> ?", vec![Value::from("x")])
            .order_by_raw("value * ?", vec![Value::from(2)]);

        let statement = sqlite().compile_select(&spec).unwrap();
        assert_snapshot!(
            statement.sql,
            @r#"SELECT ? AS marker, (SELECT COUNT(*) FROM "owners" WHERE "owners"."id" > ?) AS "owners" FROM "items" WHERE "value" BETWEEN ? AND ? AND (name <> ?) ORDER BY value * ?"#
        );
        assert_eq!(
            statement.bindings,
            vec![
                Value::from("m"),
                Value::from(5),
                Value::from(1),
                Value::from(9),
                Value::from("x"),
                Value::from(2)
            ]
        );
    }

    #[test]
    fn test_empty_in_list() {
        let empty: Vec<i64> = Vec::new();
        let spec = QuerySpec::new()
            .table("items")
            .where_in("id", empty.clone())
            .where_not_in("id", empty);
        let statement = sqlite().compile_select(&spec).unwrap();
        assert_eq!(statement.sql, r#"SELECT * FROM "items" WHERE 0 = 1 AND 1 = 1"#);
        assert!(statement.bindings.is_empty());
    }

    #[test]
    fn test_mysql_like_has_no_escape_clause() {
        let spec = QuerySpec::new().table("items").where_("name", "NOT  like", "a\\%");
        let statement = SqlGrammar::new(Dialect::MySql).compile_select(&spec).unwrap();
        assert_eq!(statement.sql, "SELECT * FROM `items` WHERE `name` NOT LIKE ?");
    }

    #[test]
    fn test_select_errors() {
        let grammar = sqlite();

        let no_table = QuerySpec::new().where_("id", "=", 1);
        assert!(matches!(grammar.compile_select(&no_table), Err(CompileError::InvalidQuery(_))));

        let offset_only = QuerySpec::new().table("items").offset(10);
        assert!(matches!(grammar.compile_select(&offset_only), Err(CompileError::InvalidQuery(_))));

        let bad_operator = QuerySpec::new().table("items").where_("id", "===", 1);
        assert!(matches!(grammar.compile_select(&bad_operator), Err(CompileError::InvalidArgument(_))));

        let empty_column = QuerySpec::new().table("items").where_(" ", "=", 1);
        assert!(matches!(grammar.compile_select(&empty_column), Err(CompileError::InvalidArgument(_))));

        let empty_group = QuerySpec::new().table("items").where_group(|q| q);
        assert!(matches!(grammar.compile_select(&empty_group), Err(CompileError::InvalidReturnValue(_))));

        let wide_sub = QuerySpec::new()
            .table("items")
            .where_sub("id", "=", |q| q.table("owners").select(["id", "name"]));
        assert!(matches!(grammar.compile_select(&wide_sub), Err(CompileError::InvalidReturnValue(_))));
    }

    #[test]
    fn test_sqlite_insert_groups_rows_by_columns() {
        let spec = insert_spec(vec![
            values! { "name" => "A", "value" => 1 },
            values! { "name" => "B", "value" => 2 },
            values! { "name" => "C" },
            values! {},
        ]);

        let statements = sqlite().compile_insert(&spec).unwrap();
        let sql: Vec<&str> = statements.iter().map(|s| s.sql.as_str()).collect();
        assert_eq!(
            sql,
            vec![
                r#"INSERT INTO "items" ("name", "value") VALUES (?, ?), (?, ?)"#,
                r#"INSERT INTO "items" ("name") VALUES (?)"#,
                r#"INSERT INTO "items" DEFAULT VALUES"#,
            ]
        );
        assert_eq!(
            statements[0].bindings,
            vec![Value::from("A"), Value::from(1), Value::from("B"), Value::from(2)]
        );
    }

    #[test]
    fn test_sqlite_insert_splits_runs_at_the_placeholder_limit() {
        let rows: Vec<ValueMap> = (0..20_000).map(|n| values! { "a" => n, "b" => n }).collect();

        let statements = sqlite().compile_insert(&insert_spec(rows)).unwrap();
        let sizes: Vec<usize> = statements.iter().map(|s| s.bindings.len()).collect();
        assert_eq!(sizes, vec![32766, 7234]);
        assert!(statements.iter().all(|s| s.bindings.len() <= SQLITE_MAX_VARIABLES));
        assert_eq!(statements[1].bindings[0], Value::from(16383));
    }

    #[test]
    fn test_common_insert_fills_missing_columns_with_default() {
        let spec = insert_spec(vec![values! { "name" => "A" }, values! { "value" => 2 }]);

        let statements = SqlGrammar::new(Dialect::Common).compile_insert(&spec).unwrap();
        assert_eq!(statements.len(), 1);
        assert_snapshot!(
            statements[0].sql,
            @r#"INSERT INTO "items" ("name", "value") VALUES (?, DEFAULT), (DEFAULT, ?)"#
        );

        let statements = SqlGrammar::new(Dialect::MySql)
            .compile_insert(&insert_spec(vec![values! {}, values! {}]))
            .unwrap();
        assert_eq!(statements[0].sql, "INSERT INTO `items` () VALUES (), ()");
    }

    #[test]
    fn test_insert_from_select() {
        let mut spec = QuerySpec::new().table("archive");
        spec.insert = Some(Insert::FromSelect {
            columns: Some(vec!["name".to_string()]),
            source: InsertSource::from(QuerySpec::new().table("items").select(["name"]).where_("value", "<", 0)),
        });
        let statements = sqlite().compile_insert(&spec).unwrap();
        assert_eq!(
            statements[0].sql,
            r#"INSERT INTO "archive" ("name") SELECT "name" FROM "items" WHERE "value" < ?"#
        );
        assert_eq!(statements[0].bindings, vec![Value::from(0)]);

        spec.insert = Some(Insert::FromSelect {
            columns: None,
            source: InsertSource::from(Raw::sql("SELECT 1")),
        });
        assert_eq!(sqlite().compile_insert(&spec).unwrap()[0].sql, r#"INSERT INTO "archive" SELECT 1"#);
    }

    #[test]
    fn test_insert_errors() {
        let grammar = sqlite();
        assert!(matches!(
            grammar.compile_insert(&QuerySpec::new().table("items")),
            Err(CompileError::InvalidQuery(_))
        ));

        let mut derived = QuerySpec::new().table_sub(|q| q.table("items"), "i");
        derived.insert = Some(Insert::Rows(vec![values! { "name" => "A" }]));
        assert!(matches!(grammar.compile_insert(&derived), Err(CompileError::InvalidQuery(_))));

        assert!(grammar.compile_insert(&insert_spec(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn test_compile_update_and_delete() {
        let mut spec = QuerySpec::new().table("items").where_("id", "=", 3);
        spec.update = values! { "name" => "Z", "value" => Raw::sql("value + 1") };

        let statement = sqlite().compile_update(&spec).unwrap();
        assert_eq!(
            statement.sql,
            r#"UPDATE "items" SET "name" = ?, "value" = value + 1 WHERE "id" = ?"#
        );
        assert_eq!(statement.bindings, vec![Value::from("Z"), Value::from(3)]);

        let statement = sqlite().compile_delete(&spec).unwrap();
        assert_eq!(statement.sql, r#"DELETE FROM "items" WHERE "id" = ?"#);
        assert_eq!(statement.bindings, vec![Value::from(3)]);
    }

    #[test]
    fn test_update_and_delete_errors() {
        let grammar = sqlite();

        let nothing = QuerySpec::new().table("items");
        assert!(matches!(grammar.compile_update(&nothing), Err(CompileError::InvalidQuery(_))));

        let limited = QuerySpec::new().table("items").order_by("id", Direction::Asc).limit(1);
        assert!(matches!(grammar.compile_delete(&limited), Err(CompileError::InvalidQuery(_))));

        let statement = SqlGrammar::new(Dialect::MySql).compile_delete(&limited).unwrap();
        assert_eq!(statement.sql, "DELETE FROM `items` ORDER BY `id` ASC LIMIT 1");

        let joined = QuerySpec::new().table("items").join("owners", "owners.id", "=", "items.owner_id");
        assert!(matches!(grammar.compile_delete(&joined), Err(CompileError::InvalidQuery(_))));
    }
}
