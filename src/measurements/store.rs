use crate::db::Database;
use crate::types::measurement::NewMeasurement;
use sqlx::SqliteConnection;

/// What happened to a reading handed to [`store_for_station`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    UnknownStation,
}

/// Upserts a reading for the station with internal id `station_id`.
///
/// A second reading for the same (station, timestamp, parameter) replaces the
/// value, unit and source of the first.
pub async fn upsert(
    db: &Database,
    station_id: i64,
    measurement: &NewMeasurement,
) -> Result<(), sqlx::Error> {
    let mut conn = db.pool().acquire().await?;
    upsert_on(&mut conn, station_id, measurement).await
}

/// Resolves `station_name` to its id and upserts the reading on one connection.
pub async fn store_for_station(
    db: &Database,
    station_name: &str,
    measurement: &NewMeasurement,
) -> Result<StoreOutcome, sqlx::Error> {
    let mut conn = db.pool().acquire().await?;
    let station_id: Option<i64> = sqlx::query_scalar("SELECT id FROM stations WHERE name = ?")
        .bind(station_name)
        .fetch_optional(&mut *conn)
        .await?;

    match station_id {
        Some(id) => {
            upsert_on(&mut conn, id, measurement).await?;
            Ok(StoreOutcome::Stored)
        }
        None => Ok(StoreOutcome::UnknownStation),
    }
}

async fn upsert_on(
    conn: &mut SqliteConnection,
    station_id: i64,
    measurement: &NewMeasurement,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO measurements (station_id, observed_at, parameter, value, unit, source)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (station_id, observed_at, parameter) DO UPDATE SET
            value = excluded.value,
            unit = excluded.unit,
            source = excluded.source",
    )
    .bind(station_id)
    .bind(measurement.observed_at)
    .bind(measurement.parameter.as_str())
    .bind(measurement.value)
    .bind(measurement.unit.as_deref())
    .bind(measurement.source.as_str())
    .execute(conn)
    .await?;
    Ok(())
}
