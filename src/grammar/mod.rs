/// Grammar Module
///
/// A grammar compiles a (prefixed) `QuerySpec` into SQL text plus the
/// ordered list of values bound to its placeholders. `SqlGrammar` covers the
/// common ANSI dialect, SQLite and MySQL; other grammars can be plugged into
/// a `Database` through the `Grammar` trait.
pub mod sql;

pub use sql::SqlGrammar;

use crate::core::value::Value;
use crate::intent::QuerySpec;
use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure raised while compiling a query intent.
#[derive(Error, Debug)]
pub enum CompileError {
    /// A builder argument the grammar can't express (operator, column name)
    #[error("{0}")]
    InvalidArgument(String),

    /// A closure-built fragment has the wrong shape
    #[error("{0}")]
    InvalidReturnValue(String),

    /// The query as a whole can't be built in this dialect
    #[error("{0}")]
    InvalidQuery(String),

    #[error("{0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// SQL text with placeholders and the values bound to them, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        CompiledStatement {
            sql: sql.into(),
            bindings,
        }
    }
}

/// Compiles query intents into SQL statements for one dialect.
pub trait Grammar: Send + Sync + fmt::Debug {
    fn compile_select(&self, spec: &QuerySpec) -> CompileResult<CompiledStatement>;

    /// May produce several statements; they are run in order.
    fn compile_insert(&self, spec: &QuerySpec) -> CompileResult<Vec<CompiledStatement>>;

    fn compile_update(&self, spec: &QuerySpec) -> CompileResult<CompiledStatement>;

    fn compile_delete(&self, spec: &QuerySpec) -> CompileResult<CompiledStatement>;

    /// Quotes a single identifier
    fn quote_identifier(&self, name: &str) -> String;

    /// Quotes every segment of a dotted identifier; `*` segments stay bare
    fn quote_composite_identifier(&self, name: &str) -> String;

    /// Escapes `%`, `_` and the escape character itself for use in a LIKE pattern
    fn escape_like_wildcards(&self, value: &str) -> String;
}

/// SQL dialects the built-in grammar speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Dialect {
    /// Plain ANSI SQL
    #[default]
    Common,
    Sqlite,
    MySql,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Common => "common",
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown SQL dialect `{0}`, expected one of: common, sqlite, mysql")]
pub struct ParseDialectError(pub String);

impl FromStr for Dialect {
    type Err = ParseDialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" | "ansi" => Ok(Dialect::Common),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySql),
            _ => Err(ParseDialectError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = ParseDialectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("SQLite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!(" mysql ".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("Common".parse::<Dialect>().unwrap(), Dialect::Common);
        assert_eq!(Dialect::default(), Dialect::Common);

        let error = "oracle".parse::<Dialect>().unwrap_err();
        assert_eq!(error, ParseDialectError("oracle".to_string()));
        assert!(error.to_string().contains("oracle"));
    }
}
