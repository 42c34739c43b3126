//! The relational store every stage writes to.

pub mod error;
pub mod schema;

pub use error::DbError;

use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// A handle to the SQLite store. Cloning shares the pool.
///
/// The pool holds a single connection: stages run one after another, and an
/// in-memory database only lives as long as its connection.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DbError::InvalidUrl(url.to_string(), e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connect(url.to_string(), e))?;

        schema::bootstrap(&pool).await?;
        info!("Opened database {}", url);
        Ok(Self { pool })
    }

    /// A private, empty database that disappears when the last clone is dropped.
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_is_repeatable() {
        let db = Database::in_memory().await.unwrap();
        schema::bootstrap(db.pool()).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert_eq!(
            tables,
            [
                "measurements",
                "model_features",
                "satellite_observations",
                "stations",
                "weather_observations"
            ]
        );
    }

    #[tokio::test]
    async fn measurements_must_reference_a_station() {
        let db = Database::in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO measurements (station_id, observed_at, parameter, value, source)
             VALUES (42, '2025-01-01T00:00:00+00:00', 'pm25', 1.0, 'OpenAQ')",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn file_databases_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("aq.sqlite").display());

        Database::connect(&url).await.unwrap();

        assert!(dir.path().join("aq.sqlite").exists());
    }
}
