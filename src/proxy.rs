/// Query Proxy
///
/// `QueryProxy` wraps a `Query` and passes every fetched row through a
/// `RowProcessor`, e.g. to turn rows into domain structs. Builder calls go
/// straight to the wrapped query.
use crate::core::db::Query;
use crate::core::{Result, Row, Value};
use crate::intent::{Builder, InsertSource, QuerySpec, ValueMap};
use std::fmt;

/// Turns a fetched row into something else
pub trait RowProcessor {
    type Output;

    fn process_row(&self, row: Row) -> Self::Output;
}

/// Leaves rows as they are
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl RowProcessor for Identity {
    type Output = Row;

    fn process_row(&self, row: Row) -> Row {
        row
    }
}

impl<F, T> RowProcessor for F
where
    F: Fn(Row) -> T,
{
    type Output = T;

    fn process_row(&self, row: Row) -> T {
        self(row)
    }
}

#[derive(Clone)]
pub struct QueryProxy<P = Identity> {
    query: Query,
    processor: P,
}

impl QueryProxy<Identity> {
    pub fn new(query: Query) -> Self {
        QueryProxy {
            query,
            processor: Identity,
        }
    }
}

impl<P: RowProcessor> QueryProxy<P> {
    /// Replaces the row processor
    pub fn with_processor<Q: RowProcessor>(self, processor: Q) -> QueryProxy<Q> {
        QueryProxy {
            query: self.query,
            processor,
        }
    }

    pub fn get(&self) -> Result<Vec<P::Output>> {
        let rows = self.query.get()?;
        Ok(self.process_rows(rows))
    }

    pub fn first(&self) -> Result<Option<P::Output>> {
        let row = self.query.first()?;
        Ok(row.map(|row| self.processor.process_row(row)))
    }

    /// Same as [`Query::chunk`], with processed rows
    pub fn chunk<F>(&self, size: i64, mut callback: F) -> Result<()>
    where
        F: FnMut(Vec<P::Output>),
    {
        self.query.chunk(size, |rows| callback(self.process_rows(rows)))
    }

    // Aggregates and writes return no rows and go straight to the base query

    pub fn count(&self) -> Result<i64> {
        self.query.count()
    }

    pub fn count_column(&self, column: &str) -> Result<i64> {
        self.query.count_column(column)
    }

    pub fn avg(&self, column: &str) -> Result<Option<Value>> {
        self.query.avg(column)
    }

    pub fn sum(&self, column: &str) -> Result<Option<Value>> {
        self.query.sum(column)
    }

    pub fn min(&self, column: &str) -> Result<Option<Value>> {
        self.query.min(column)
    }

    pub fn max(&self, column: &str) -> Result<Option<Value>> {
        self.query.max(column)
    }

    pub fn insert<I>(&self, rows: I) -> Result<u64>
    where
        I: IntoIterator<Item = ValueMap>,
    {
        self.query.insert(rows)
    }

    pub fn insert_get_id(&self, row: ValueMap, sequence: Option<&str>) -> Result<Option<i64>> {
        self.query.insert_get_id(row, sequence)
    }

    pub fn insert_from_select<S>(&self, columns: &[&str], source: S) -> Result<u64>
    where
        S: Into<InsertSource>,
    {
        self.query.insert_from_select(columns, source)
    }

    pub fn update(&self, values: ValueMap) -> Result<u64> {
        self.query.update(values)
    }

    pub fn delete(&self) -> Result<u64> {
        self.query.delete()
    }

    pub fn base_query(&self) -> &Query {
        &self.query
    }

    pub fn into_base_query(self) -> Query {
        self.query
    }

    fn process_rows(&self, rows: Vec<Row>) -> Vec<P::Output> {
        rows.into_iter().map(|row| self.processor.process_row(row)).collect()
    }
}

impl<P> Builder for QueryProxy<P> {
    fn spec_mut(&mut self) -> &mut QuerySpec {
        self.query.spec_mut()
    }
}

impl<P> fmt::Debug for QueryProxy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryProxy").field("query", &self.query).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Direction;
    use crate::test_utils::ItemsFixture;
    use crate::values;

    #[derive(Debug, PartialEq)]
    struct Item {
        name: String,
    }

    fn to_item(row: Row) -> Item {
        Item {
            name: row["name"].as_str().unwrap_or_default().to_string(),
        }
    }

    #[test]
    fn test_identity_proxy_returns_rows() {
        let fixture = ItemsFixture::new();
        let proxy = QueryProxy::new(fixture.database.table("items")).order_by("id", Direction::Asc);
        let rows = proxy.get().unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0]["name"], Value::from("Banana"));
    }

    #[test]
    fn test_processor_maps_rows() {
        let fixture = ItemsFixture::new();
        let proxy = QueryProxy::new(fixture.database.table("items"))
            .with_processor(to_item)
            .where_("value", ">", 200)
            .order_by("name", Direction::Asc);

        assert_eq!(
            proxy.get().unwrap(),
            vec![Item { name: "Orange".to_string() }, Item { name: "Pillow".to_string() }]
        );
        assert_eq!(proxy.first().unwrap(), Some(Item { name: "Orange".to_string() }));

        let mut names = Vec::new();
        proxy
            .chunk(1, |items| names.extend(items.into_iter().map(|item| item.name)))
            .unwrap();
        assert_eq!(names, vec!["Orange", "Pillow"]);
    }

    #[test]
    fn test_aggregates_and_writes_reach_the_base_query() {
        let fixture = ItemsFixture::new();
        let proxy = QueryProxy::new(fixture.database.table("items"))
            .with_processor(to_item)
            .where_("value", ">", 200);

        assert_eq!(proxy.count().unwrap(), 2);
        assert_eq!(proxy.count_column("price").unwrap(), 2);
        assert_eq!(proxy.sum("value").unwrap(), Some(Value::Integer(533)));
        assert_eq!(proxy.min("name").unwrap(), Some(Value::from("Orange")));
        assert_eq!(proxy.max("value").unwrap(), Some(Value::Integer(314)));
        assert_eq!(proxy.avg("price").unwrap().and_then(|v| v.as_f64()), Some(6.5));

        let id = proxy
            .insert_get_id(values! { "name" => "Sofa", "value" => 900 }, None)
            .unwrap();
        assert_eq!(id, Some(7));
        assert_eq!(proxy.insert(vec![values! { "name" => "Lamp", "value" => 250 }]).unwrap(), 1);
        assert_eq!(proxy.update(values! { "price" => 3 }).unwrap(), 4);
        assert_eq!(proxy.delete().unwrap(), 4);
        assert_eq!(proxy.count().unwrap(), 0);
        assert_eq!(fixture.database.table("items").count().unwrap(), 4);
    }

    #[test]
    fn test_errors_are_normalized() {
        let fixture = ItemsFixture::new();
        let proxy = QueryProxy::new(fixture.database.table("missing"));
        assert!(proxy.get().is_err());
        assert!(proxy.chunk(0, |_| {}).is_err());
    }
}
