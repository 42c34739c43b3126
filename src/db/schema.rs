//! Tables are created on start-up if missing and never migrated.

use crate::db::error::DbError;
use log::debug;
use sqlx::SqlitePool;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "stations",
        "CREATE TABLE IF NOT EXISTS stations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id TEXT,
            name TEXT NOT NULL UNIQUE,
            latitude REAL,
            longitude REAL,
            kind TEXT NOT NULL CHECK (kind IN ('station', 'virtual')),
            source TEXT NOT NULL)",
    ),
    (
        "measurements",
        "CREATE TABLE IF NOT EXISTS measurements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            station_id INTEGER NOT NULL REFERENCES stations(id),
            observed_at TEXT NOT NULL,
            parameter TEXT NOT NULL,
            value REAL NOT NULL,
            unit TEXT,
            source TEXT NOT NULL,
            UNIQUE (station_id, observed_at, parameter))",
    ),
    (
        "weather_observations",
        "CREATE TABLE IF NOT EXISTS weather_observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            observed_at TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            temperature REAL,
            humidity REAL,
            wind_speed REAL,
            wind_direction REAL,
            pressure REAL,
            source TEXT NOT NULL,
            UNIQUE (observed_at, latitude, longitude, source))",
    ),
    (
        "satellite_observations",
        "CREATE TABLE IF NOT EXISTS satellite_observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product TEXT NOT NULL,
            parameter TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            value REAL NOT NULL,
            unit TEXT,
            observed_at TEXT,
            raw_path TEXT)",
    ),
    (
        "satellite_observations",
        // A plain UNIQUE constraint would let rows without a timestamp repeat.
        "CREATE UNIQUE INDEX IF NOT EXISTS satellite_observations_pixel
            ON satellite_observations (product, parameter, latitude, longitude, COALESCE(observed_at, ''))",
    ),
    (
        "model_features",
        "CREATE TABLE IF NOT EXISTS model_features (
            observed_at TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            pm25 REAL,
            no2 REAL,
            o3 REAL,
            temperature REAL,
            wind_speed REAL,
            other_features TEXT,
            PRIMARY KEY (observed_at, latitude, longitude))",
    ),
];

/// Creates every table the pipeline writes to.
pub async fn bootstrap(pool: &SqlitePool) -> Result<(), DbError> {
    for &(table, statement) in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|source| DbError::Schema { table, source })?;
        debug!("Ensured table {}", table);
    }
    Ok(())
}
