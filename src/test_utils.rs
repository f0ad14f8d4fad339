/// # Test Utilities Module
///
/// Fixtures shared by the unit tests: an isolated in-memory database with
/// the `pre_` table prefix and a small `items` table.
///
/// Each fixture opens its own in-memory connection, so tests never see each
/// other's writes.
use crate::config::DatabaseConfig;
use crate::core::db::Database;
use crate::core::{Result, Value};

pub const TEST_PREFIX: &str = "pre_";

/// Isolated database test fixture
pub struct ItemsFixture {
    pub database: Database,
}

impl ItemsFixture {
    /// Creates the fixture with sample data, panicking on setup failures
    pub fn new() -> Self {
        Self::with_sample_data().expect("Failed to set up the items fixture")
    }

    pub fn with_sample_data() -> Result<Self> {
        let config = DatabaseConfig {
            prefix: Some(TEST_PREFIX.to_string()),
            ..DatabaseConfig::memory()
        };
        let fixture = ItemsFixture {
            database: Database::create(&config)?,
        };
        fixture.setup_schema()?;
        fixture.populate_sample_data()?;
        Ok(fixture)
    }

    /// Set up the test schema
    fn setup_schema(&self) -> Result<()> {
        self.database.statements(
            "
            CREATE TABLE pre_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                value NUMERIC,
                price NUMERIC
            );
            CREATE INDEX idx_pre_items_name ON pre_items (name);
        ",
        )
    }

    /// Populate with sample rows; ids run from 1 to 6
    fn populate_sample_data(&self) -> Result<()> {
        let items: Vec<(&str, Value, Value)> = vec![
            ("Banana", 123.5.into(), 1.5.into()),
            ("Apple", (-10).into(), 0.5.into()),
            ("Pen", 0.into(), 2.into()),
            ("Orange", 314.into(), 1.into()),
            ("Pillow", 219.into(), 12.into()),
            ("Box", (-1).into(), None::<i64>.into()),
        ];

        for (name, value, price) in items {
            self.database.insert(
                "INSERT INTO pre_items (name, value, price) VALUES (?, ?, ?)",
                &[name.into(), value, price],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creation() {
        let fixture = ItemsFixture::new();
        let rows = fixture.database.select("SELECT * FROM pre_items ORDER BY id", &[]).unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0]["name"], Value::from("Banana"));
        assert_eq!(rows[5]["price"], Value::Null);
        assert_eq!(fixture.database.table_prefixer().prefix(), TEST_PREFIX);
    }

    #[test]
    fn test_fixtures_are_isolated() {
        let first = ItemsFixture::new();
        let second = ItemsFixture::new();
        first.database.statements("DELETE FROM pre_items").unwrap();
        assert_eq!(second.database.select("SELECT id FROM pre_items", &[]).unwrap().len(), 6);
    }
}
