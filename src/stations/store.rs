use crate::db::Database;
use crate::stations::error::StationError;
use crate::types::station::{NewStation, StationKind};

/// Inserts `station` unless one with the same name exists. Returns whether a row was added.
pub async fn insert_station(db: &Database, station: &NewStation) -> Result<bool, sqlx::Error> {
    let done = sqlx::query(
        "INSERT INTO stations (provider_id, name, latitude, longitude, kind, source)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(&station.provider_id)
    .bind(&station.name)
    .bind(station.latitude)
    .bind(station.longitude)
    .bind(station.kind.as_str())
    .bind(&station.source)
    .execute(db.pool())
    .await?;
    Ok(done.rows_affected() > 0)
}

/// Creates the synthetic station `name` if missing and returns its id.
pub async fn ensure_virtual_station(
    db: &Database,
    name: &str,
    source: &str,
    latitude: f64,
    longitude: f64,
) -> Result<i64, StationError> {
    let station = NewStation {
        provider_id: name.to_string(),
        name: name.to_string(),
        latitude: Some(latitude),
        longitude: Some(longitude),
        kind: StationKind::Virtual,
        source: source.to_string(),
    };
    insert_station(db, &station)
        .await
        .map_err(StationError::Database)?;

    sqlx::query_scalar("SELECT id FROM stations WHERE name = ?")
        .bind(name)
        .fetch_one(db.pool())
        .await
        .map_err(StationError::Database)
}
