// Core infrastructure modules
pub mod core;

// Query pipeline modules
pub mod config;
pub mod grammar;
pub mod intent;
pub mod pagination;
pub mod prefixer;
pub mod proxy;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::config::{load_config, Config, DatabaseConfig, SqliteOptions};
pub use crate::core::db::{Connection, Database, ImportSource, Query, SqliteConnection};
pub use crate::core::{Error, ErrorKind, Result, Row, Value};
pub use crate::grammar::{CompiledStatement, Dialect, Grammar, SqlGrammar};
pub use crate::intent::{Builder, Direction, Expr, QuerySpec, Raw, ValueMap};
pub use crate::pagination::Paginator;
pub use crate::prefixer::TablePrefixer;
pub use crate::proxy::{QueryProxy, RowProcessor};

/// Builds a [`ValueMap`] (one insert row or one set of update assignments).
///
/// ```
/// use minidb::values;
///
/// let row = values! { "name" => "Banana", "value" => 123.4 };
/// assert_eq!(row.len(), 2);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        $crate::intent::ValueMap::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::intent::ValueMap::new();
        $(
            map.insert(::std::string::String::from($column), $crate::intent::Expr::from($value));
        )+
        map
    }};
}
