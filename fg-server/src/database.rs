use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::DatabaseConfig;

pub type Connection = PooledConnection<SqliteConnectionManager>;

#[derive(Clone, Debug)]
pub struct Database {
    pub pool: r2d2::Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::open(&config.path)
    }

    /// Open (creating if needed) the database file at `path` and migrate it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating database directory {}", parent.display()))?;
        }
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            // Cascading deletes depend on this, and SQLite turns it off per connection
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = r2d2::Pool::new(manager)?;
        let me = Self { pool };
        me.migrate()?;
        Ok(me)
    }

    /// Borrow a connection from the pool.
    pub fn conn(&self) -> std::result::Result<Connection, r2d2::Error> {
        self.pool.get()
    }

    /// Migrate the database to the latest version.
    fn migrate(&self) -> Result<()> {
        let migrations = [
            include_str!("migrations/01-initial.sql"),
            include_str!("migrations/02-auth-tokens.sql"),
        ];
        // Find the current migration version. If it fails, we need to run all the migrations.
        let conn = self.pool.get()?;
        let current_version: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                rusqlite::params![],
                |row| row.get(0),
            )
            .unwrap_or("0".to_string());
        let current_version = current_version.parse::<usize>().unwrap_or(0);
        tracing::info!("Current schema version: {}", current_version);
        for (i, migration) in migrations.iter().enumerate().skip(current_version) {
            tracing::warn!("Applying migration {}", i + 1);
            conn.execute_batch(migration)
                .with_context(|| format!("Applying migration {}", i + 1))?;
        }
        Ok(())
    }
}

/// Convenience method to collect rows from a query into a Vec.
pub fn collect_rows<T: FromRow, P: rusqlite::Params>(
    conn: &rusqlite::Connection,
    sql: &str,
    parameters: P,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query(parameters)?;
    rows.mapped(T::from_row).collect()
}

/// Like `collect_rows`, for queries expected to return at most one row.
pub fn first_row<T: FromRow, P: rusqlite::Params>(
    conn: &rusqlite::Connection,
    sql: &str,
    parameters: P,
) -> rusqlite::Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(parameters)?;
    rows.next()?.map(T::from_row).transpose()
}

pub trait FromRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_recorded_and_not_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/foodgram.db");
        let db = Database::open(&path).unwrap();
        let version: String = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, "2");
        drop(db);
        // Reopening must not try to recreate the tables
        Database::open(&path).unwrap();
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("fk.db")).unwrap();
        let conn = db.conn().unwrap();
        let result = conn.execute(
            "INSERT INTO ingredient_recipe (ingredient_id, recipe_id, amount) VALUES (1, 1, 1)",
            [],
        );
        assert!(result.is_err());
    }
}
