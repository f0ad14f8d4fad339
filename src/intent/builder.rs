/// Intent Builder
///
/// The fluent builder API shared by `QuerySpec`, `Query` and `QueryProxy`.
///
/// Sub-queries and predicate groups are built by closures that receive a
/// fresh `QuerySpec` and return it. The returned value is captured right
/// away; nothing keeps a reference to the closure.
use super::{
    AggregateFunction, Condition, Conjunction, Criterion, Direction, Expr, InValues, Join, JoinKind, Order,
    QuerySpec, Raw, SelectItem, TableSource,
};
use crate::core::value::Value;

/// Every method consumes the builder and returns it with one more clause,
/// so calls chain:
///
/// ```
/// use minidb::{Builder, Direction, QuerySpec};
///
/// let spec = QuerySpec::new()
///     .table("items")
///     .where_("value", ">", 10)
///     .order_by("name", Direction::Asc)
///     .limit(5);
/// assert_eq!(spec.limit, Some(5));
/// ```
pub trait Builder: Sized {
    /// The intent being built
    fn spec_mut(&mut self) -> &mut QuerySpec;

    // ---- table ----

    /// Sets the table to read from or write to
    fn table(mut self, name: impl Into<String>) -> Self {
        let spec = self.spec_mut();
        spec.table = Some(TableSource::Name(name.into()));
        spec.alias = None;
        self
    }

    fn table_as(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        let spec = self.spec_mut();
        spec.table = Some(TableSource::Name(name.into()));
        spec.alias = Some(alias.into());
        self
    }

    /// Reads from a derived table built by `build`
    fn table_sub<F>(mut self, build: F, alias: impl Into<String>) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        let spec = self.spec_mut();
        spec.table = Some(TableSource::SubQuery(Box::new(build(QuerySpec::new()))));
        spec.alias = Some(alias.into());
        self
    }

    fn table_raw(mut self, raw: Raw, alias: Option<&str>) -> Self {
        let spec = self.spec_mut();
        spec.table = Some(TableSource::Raw(raw));
        spec.alias = alias.map(String::from);
        self
    }

    // ---- select list ----

    /// Replaces the select list with the given columns
    fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec_mut().select.clear();
        self.add_select(columns)
    }

    fn add_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec_mut()
            .select
            .extend(columns.into_iter().map(|column| SelectItem {
                expr: Expr::Column(column.into()),
                alias: None,
            }));
        self
    }

    fn add_select_as(mut self, expr: impl Into<Expr>, alias: impl Into<String>) -> Self {
        self.spec_mut().select.push(SelectItem {
            expr: expr.into(),
            alias: Some(alias.into()),
        });
        self
    }

    fn add_select_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.spec_mut().select.push(SelectItem {
            expr: Expr::raw(sql, bindings),
            alias: None,
        });
        self
    }

    /// Adds a scalar sub-query column
    fn add_select_sub<F>(self, build: F, alias: impl Into<String>) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        self.add_select_as(build(QuerySpec::new()), alias)
    }

    fn add_aggregate(mut self, function: AggregateFunction, column: impl Into<String>, alias: Option<&str>) -> Self {
        self.spec_mut().select.push(SelectItem {
            expr: Expr::aggregate(function, Expr::Column(column.into())),
            alias: alias.map(String::from),
        });
        self
    }

    fn add_count(self, column: impl Into<String>, alias: Option<&str>) -> Self {
        self.add_aggregate(AggregateFunction::Count, column, alias)
    }

    fn add_avg(self, column: impl Into<String>, alias: Option<&str>) -> Self {
        self.add_aggregate(AggregateFunction::Avg, column, alias)
    }

    fn add_sum(self, column: impl Into<String>, alias: Option<&str>) -> Self {
        self.add_aggregate(AggregateFunction::Sum, column, alias)
    }

    fn add_min(self, column: impl Into<String>, alias: Option<&str>) -> Self {
        self.add_aggregate(AggregateFunction::Min, column, alias)
    }

    fn add_max(self, column: impl Into<String>, alias: Option<&str>) -> Self {
        self.add_aggregate(AggregateFunction::Max, column, alias)
    }

    // ---- where ----

    /// Appends a predicate joined with the given conjunction
    fn add_criterion(mut self, conjunction: Conjunction, condition: Condition) -> Self {
        self.spec_mut().criteria.push(Criterion { conjunction, condition });
        self
    }

    /// `column <operator> value`; the value may be a literal, a raw fragment or a sub-query
    fn where_(self, column: impl Into<String>, operator: &str, value: impl Into<Expr>) -> Self {
        self.add_criterion(Conjunction::And, compare(Expr::Column(column.into()), operator, value.into()))
    }

    fn or_where(self, column: impl Into<String>, operator: &str, value: impl Into<Expr>) -> Self {
        self.add_criterion(Conjunction::Or, compare(Expr::Column(column.into()), operator, value.into()))
    }

    /// Compares two columns
    fn where_column(self, first: impl Into<String>, operator: &str, second: impl Into<String>) -> Self {
        self.add_criterion(
            Conjunction::And,
            compare(Expr::Column(first.into()), operator, Expr::Column(second.into())),
        )
    }

    /// Compares a column with a scalar sub-query built by `build`
    fn where_sub<F>(self, column: impl Into<String>, operator: &str, build: F) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        self.where_(column, operator, build(QuerySpec::new()))
    }

    fn where_null(self, column: impl Into<String>) -> Self {
        self.add_criterion(Conjunction::And, null_test(column, false))
    }

    fn or_where_null(self, column: impl Into<String>) -> Self {
        self.add_criterion(Conjunction::Or, null_test(column, false))
    }

    fn where_not_null(self, column: impl Into<String>) -> Self {
        self.add_criterion(Conjunction::And, null_test(column, true))
    }

    fn where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        self.add_criterion(Conjunction::And, in_list(column, values, false))
    }

    fn where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        self.add_criterion(Conjunction::And, in_list(column, values, true))
    }

    fn where_in_sub<F>(self, column: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        let condition = Condition::In {
            operand: Expr::Column(column.into()),
            values: InValues::SubQuery(Box::new(build(QuerySpec::new()))),
            negated: false,
        };
        self.add_criterion(Conjunction::And, condition)
    }

    fn where_between(self, column: impl Into<String>, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        let condition = Condition::Between {
            operand: Expr::Column(column.into()),
            low: low.into(),
            high: high.into(),
            negated: false,
        };
        self.add_criterion(Conjunction::And, condition)
    }

    fn where_not_between(self, column: impl Into<String>, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        let condition = Condition::Between {
            operand: Expr::Column(column.into()),
            low: low.into(),
            high: high.into(),
            negated: true,
        };
        self.add_criterion(Conjunction::And, condition)
    }

    fn where_raw(self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.add_criterion(Conjunction::And, Condition::Raw(Raw::new(sql, bindings)))
    }

    fn or_where_raw(self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.add_criterion(Conjunction::Or, Condition::Raw(Raw::new(sql, bindings)))
    }

    fn where_exists<F>(self, build: F) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        let condition = Condition::Exists {
            query: Box::new(build(QuerySpec::new())),
            negated: false,
        };
        self.add_criterion(Conjunction::And, condition)
    }

    fn where_not_exists<F>(self, build: F) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        let condition = Condition::Exists {
            query: Box::new(build(QuerySpec::new())),
            negated: true,
        };
        self.add_criterion(Conjunction::And, condition)
    }

    /// Adds a parenthesized group made of the criteria `build` adds
    fn where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        let group = build(QuerySpec::new()).criteria;
        self.add_criterion(Conjunction::And, Condition::Group(group))
    }

    fn or_where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
    {
        let group = build(QuerySpec::new()).criteria;
        self.add_criterion(Conjunction::Or, Condition::Group(group))
    }

    // ---- joins ----

    fn add_join(mut self, join: Join) -> Self {
        self.spec_mut().joins.push(join);
        self
    }

    fn join(self, table: impl Into<String>, first: impl Into<String>, operator: &str, second: impl Into<String>) -> Self {
        self.add_join(named_join(JoinKind::Inner, table, None, first, operator, second))
    }

    fn join_as(
        self,
        table: impl Into<String>,
        alias: impl Into<String>,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
    ) -> Self {
        self.add_join(named_join(JoinKind::Inner, table, Some(alias.into()), first, operator, second))
    }

    fn left_join(
        self,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
    ) -> Self {
        self.add_join(named_join(JoinKind::Left, table, None, first, operator, second))
    }

    fn left_join_as(
        self,
        table: impl Into<String>,
        alias: impl Into<String>,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
    ) -> Self {
        self.add_join(named_join(JoinKind::Left, table, Some(alias.into()), first, operator, second))
    }

    /// Joins a derived table built by `build`; `on` adds the join criteria
    fn join_sub<F, G>(self, kind: JoinKind, build: F, alias: impl Into<String>, on: G) -> Self
    where
        F: FnOnce(QuerySpec) -> QuerySpec,
        G: FnOnce(QuerySpec) -> QuerySpec,
    {
        self.add_join(Join {
            kind,
            table: TableSource::SubQuery(Box::new(build(QuerySpec::new()))),
            alias: Some(alias.into()),
            on: on(QuerySpec::new()).criteria,
        })
    }

    fn cross_join(self, table: impl Into<String>) -> Self {
        self.add_join(Join {
            kind: JoinKind::Cross,
            table: TableSource::Name(table.into()),
            alias: None,
            on: Vec::new(),
        })
    }

    // ---- grouping, ordering, paging ----

    fn group_by(mut self, column: impl Into<String>) -> Self {
        self.spec_mut().group_by.push(Expr::Column(column.into()));
        self
    }

    fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.spec_mut().order_by.push(Order {
            expr: Expr::Column(column.into()),
            direction: Some(direction),
        });
        self
    }

    fn order_by_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.spec_mut().order_by.push(Order {
            expr: Expr::raw(sql, bindings),
            direction: None,
        });
        self
    }

    fn limit(mut self, limit: u64) -> Self {
        self.spec_mut().limit = Some(limit);
        self
    }

    fn offset(mut self, offset: u64) -> Self {
        self.spec_mut().offset = Some(offset);
        self
    }
}

impl Builder for QuerySpec {
    fn spec_mut(&mut self) -> &mut QuerySpec {
        self
    }
}

fn compare(left: Expr, operator: &str, right: Expr) -> Condition {
    Condition::Compare {
        left,
        operator: operator.to_string(),
        right,
    }
}

fn null_test(column: impl Into<String>, negated: bool) -> Condition {
    Condition::Null {
        operand: Expr::Column(column.into()),
        negated,
    }
}

fn in_list<I, V>(column: impl Into<String>, values: I, negated: bool) -> Condition
where
    I: IntoIterator<Item = V>,
    V: Into<Expr>,
{
    Condition::In {
        operand: Expr::Column(column.into()),
        values: InValues::List(values.into_iter().map(Into::into).collect()),
        negated,
    }
}

fn named_join(
    kind: JoinKind,
    table: impl Into<String>,
    alias: Option<String>,
    first: impl Into<String>,
    operator: &str,
    second: impl Into<String>,
) -> Join {
    Join {
        kind,
        table: TableSource::Name(table.into()),
        alias,
        on: vec![Criterion {
            conjunction: Conjunction::And,
            condition: compare(Expr::Column(first.into()), operator, Expr::Column(second.into())),
        }],
    }
}
