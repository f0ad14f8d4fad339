/// Query Intent Module
///
/// This module defines `QuerySpec`, the plain value describing what a query
/// should do, and the expression and clause types it is made of. A
/// `QuerySpec` refers to *logical* table names; prefixing and compiling
/// happen later, on a copy.
///
/// `QuerySpec` owns its whole tree, so `clone()` is a deep copy of every
/// clause and nested sub-query.
pub mod builder;

pub use builder::Builder;

use crate::core::value::Value;
use indexmap::IndexMap;

/// Column name to value-or-expression; one insert row or one set of update assignments.
pub type ValueMap = IndexMap<String, Expr>;

/// A hand-written SQL fragment with its own positional bindings.
///
/// Raw text is never rewritten by the table prefixer.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl Raw {
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Raw {
            sql: sql.into(),
            bindings,
        }
    }

    /// A fragment without bindings
    pub fn sql(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// Aggregate functions supported in select lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// An operand anywhere in a query: select items, predicate sides, order and
/// group clauses, insert and update values.
///
/// Conversions from plain Rust values (`&str` included) produce
/// [`Expr::Value`]; column references are always explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference such as `name`, `items.name` or `*`
    Column(String),
    /// A literal, compiled to a placeholder
    Value(Value),
    Raw(Raw),
    /// A sub-query used as a scalar or as a row source
    SubQuery(Box<QuerySpec>),
    Aggregate {
        function: AggregateFunction,
        argument: Box<Expr>,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    pub fn raw(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Expr::Raw(Raw::new(sql, bindings))
    }

    pub fn aggregate(function: AggregateFunction, argument: Expr) -> Self {
        Expr::Aggregate {
            function,
            argument: Box::new(argument),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}

impl From<Raw> for Expr {
    fn from(raw: Raw) -> Self {
        Expr::Raw(raw)
    }
}

impl From<QuerySpec> for Expr {
    fn from(spec: QuerySpec) -> Self {
        Expr::SubQuery(Box::new(spec))
    }
}

macro_rules! expr_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(value: $t) -> Self {
                    Expr::Value(Value::from(value))
                }
            }
        )*
    };
}

expr_from_value!(i64, i32, u32, f64, bool, &str, String, Vec<u8>);

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Expr::Value(Value::from(value))
    }
}

/// What a query reads from or writes to
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// A logical table name, optionally database-qualified
    Name(String),
    /// A derived table
    SubQuery(Box<QuerySpec>),
    Raw(Raw),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// One predicate of a criteria list with the conjunction joining it to the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub conjunction: Conjunction,
    pub condition: Condition,
}

/// Right-hand side of an `IN` predicate
#[derive(Debug, Clone, PartialEq)]
pub enum InValues {
    List(Vec<Expr>),
    SubQuery(Box<QuerySpec>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Expr,
        operator: String,
        right: Expr,
    },
    Null {
        operand: Expr,
        negated: bool,
    },
    In {
        operand: Expr,
        values: InValues,
        negated: bool,
    },
    Between {
        operand: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },
    Exists {
        query: Box<QuerySpec>,
        negated: bool,
    },
    Raw(Raw),
    /// A parenthesized group of criteria
    Group(Vec<Criterion>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableSource,
    pub alias: Option<String>,
    pub on: Vec<Criterion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub expr: Expr,
    /// `None` for raw orderings that carry their own direction
    pub direction: Option<Direction>,
}

/// Source rows of an insert-from-select
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Query(Box<QuerySpec>),
    Raw(Raw),
}

impl From<QuerySpec> for InsertSource {
    fn from(spec: QuerySpec) -> Self {
        InsertSource::Query(Box::new(spec))
    }
}

impl From<Raw> for InsertSource {
    fn from(raw: Raw) -> Self {
        InsertSource::Raw(raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Insert {
    Rows(Vec<ValueMap>),
    FromSelect {
        columns: Option<Vec<String>>,
        source: InsertSource,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    #[default]
    Select,
    Insert,
    InsertFromSelect,
    Update,
    Delete,
}

/// The query intent.
///
/// Built with the [`Builder`] methods; the terminal operations of
/// [`Query`](crate::Query) work on copies of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub table: Option<TableSource>,
    pub alias: Option<String>,
    pub select: Vec<SelectItem>,
    pub joins: Vec<Join>,
    pub criteria: Vec<Criterion>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub insert: Option<Insert>,
    pub update: ValueMap,
    pub kind: OperationKind,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aliases this query declares: its own table alias and its join aliases.
    pub fn declared_aliases(&self) -> impl Iterator<Item = &str> {
        self.alias
            .as_deref()
            .into_iter()
            .chain(self.joins.iter().filter_map(|join| join.alias.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_values_become_literals() {
        assert_eq!(Expr::from("name"), Expr::Value(Value::Text("name".to_string())));
        assert_eq!(Expr::from(5), Expr::Value(Value::Integer(5)));
        assert_eq!(Expr::from(None::<&str>), Expr::Value(Value::Null));
        assert_eq!(Expr::column("name"), Expr::Column("name".to_string()));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = QuerySpec::new();
        original.table = Some(TableSource::Name("items".to_string()));
        original.criteria.push(Criterion {
            conjunction: Conjunction::And,
            condition: Condition::Exists {
                query: Box::new(QuerySpec::new()),
                negated: false,
            },
        });

        let mut copy = original.clone();
        copy.limit = Some(1);
        if let Condition::Exists { query, .. } = &mut copy.criteria[0].condition {
            query.table = Some(TableSource::Name("other".to_string()));
        }

        assert_eq!(original.limit, None);
        match &original.criteria[0].condition {
            Condition::Exists { query, .. } => assert_eq!(query.table, None),
            other => panic!("Unexpected condition {:?}", other),
        }
    }

    #[test]
    fn test_declared_aliases() {
        let mut spec = QuerySpec::new();
        spec.alias = Some("i".to_string());
        spec.joins.push(Join {
            kind: JoinKind::Left,
            table: TableSource::Name("owners".to_string()),
            alias: Some("o".to_string()),
            on: Vec::new(),
        });
        spec.joins.push(Join {
            kind: JoinKind::Cross,
            table: TableSource::Name("tags".to_string()),
            alias: None,
            on: Vec::new(),
        });
        assert_eq!(spec.declared_aliases().collect::<Vec<_>>(), vec!["i", "o"]);
    }
}
