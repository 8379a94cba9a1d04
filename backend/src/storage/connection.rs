use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// DbConnection owns the SQLite pool shared by every repository
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open (creating if missing) the database file and set up the schema
    pub async fn new(path: &Path) -> Result<Self> {
        info!("Opening database at {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        Self::from_pool(pool).await
    }

    /// Initialize a private in-memory database for tests
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // A single connection that never expires keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        Self::setup_schema(&pool).await?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Set up the required database schema. Safe to run on every start.
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        // AUTOINCREMENT guarantees ids of deleted rows are never handed out again
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS medicines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                medicine_type TEXT NOT NULL,
                dosage TEXT NOT NULL,
                time_of_day TEXT NOT NULL,
                notes TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                prescription_path TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create medicines table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_medicines_name
            ON medicines(name);
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create medicines name index")?;

        Ok(())
    }
}
