/// Pagination
///
/// `Paginator` exposes a query the way pagination widgets consume it: the
/// total number of results, and a slice of rows at an offset.
use crate::core::db::Query;
use crate::core::{Error, Result, Row};
use crate::intent::Builder;

#[derive(Debug, Clone)]
pub struct Paginator {
    query: Query,
}

impl Paginator {
    pub fn new(query: Query) -> Self {
        Paginator { query }
    }

    /// Number of rows the whole query selects
    pub fn total_results(&self) -> Result<i64> {
        self.query.count()
    }

    /// `length` rows starting at `offset`
    pub fn slice(&self, offset: u64, length: u64) -> Result<Vec<Row>> {
        self.query.clone().offset(offset).limit(length).get()
    }

    /// One page of rows; pages are numbered from 1
    pub fn page(&self, number: u64, per_page: u64) -> Result<Vec<Row>> {
        if number == 0 {
            return Err(Error::invalid_argument("Page numbers start at 1"));
        }
        if per_page == 0 {
            return Err(Error::invalid_argument("Pages must hold at least one row"));
        }
        let offset = (number - 1)
            .checked_mul(per_page)
            .ok_or_else(|| Error::invalid_argument("Page is out of range"))?;
        self.slice(offset, per_page)
    }

    /// Number of pages of `per_page` rows
    pub fn page_count(&self, per_page: u64) -> Result<u64> {
        if per_page == 0 {
            return Err(Error::invalid_argument("Pages must hold at least one row"));
        }
        let total = self.total_results()?.max(0) as u64;
        Ok(total.div_ceil(per_page))
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, Value};
    use crate::intent::Direction;
    use crate::test_utils::ItemsFixture;

    #[test]
    fn test_slices_and_pages() {
        let fixture = ItemsFixture::new();
        let paginator = Paginator::new(fixture.database.table("items").order_by("id", Direction::Asc));

        assert_eq!(paginator.total_results().unwrap(), 6);
        assert_eq!(paginator.page_count(4).unwrap(), 2);

        let slice = paginator.slice(1, 2).unwrap();
        let ids: Vec<_> = slice.iter().map(|row| row["id"].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(2), Value::Integer(3)]);

        let last = paginator.page(2, 4).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0]["id"], Value::Integer(5));
    }

    #[test]
    fn test_invalid_pages() {
        let fixture = ItemsFixture::new();
        let paginator = Paginator::new(fixture.database.table("items"));
        assert_eq!(paginator.page(0, 10).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(paginator.page(1, 0).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(paginator.page(u64::MAX, 2).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_huge_page_sizes() {
        let fixture = ItemsFixture::new();
        let paginator = Paginator::new(fixture.database.table("items"));
        assert_eq!(paginator.page_count(u64::MAX).unwrap(), 1);
        assert_eq!(paginator.page_count(u64::MAX - 1).unwrap(), 1);
        assert_eq!(paginator.page(1, i64::MAX as u64).unwrap().len(), 6);
    }
}
