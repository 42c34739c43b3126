use crate::db::Database;
use crate::satellite::decode::SatelliteRecord;
use crate::satellite::error::SatelliteError;
use chrono::{DateTime, Utc};
use log::{error, info};
use sqlx::{QueryBuilder, Sqlite};

/// Rows per INSERT statement; eight binds each keeps well under SQLite's limit.
const CHUNK_SIZE: usize = 100;

/// A `satellite_observations` row borrowed from its source record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationRow<'a> {
    pub product: &'a str,
    pub parameter: &'a str,
    pub unit: Option<&'a str>,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
    pub observed_at: Option<DateTime<Utc>>,
    pub raw_path: Option<&'a str>,
}

pub trait AsObservationRow {
    fn as_row(&self) -> ObservationRow<'_>;
}

impl AsObservationRow for SatelliteRecord {
    fn as_row(&self) -> ObservationRow<'_> {
        ObservationRow {
            product: self.product.name(),
            parameter: self.parameter(),
            unit: Some(self.unit()),
            latitude: self.latitude,
            longitude: self.longitude,
            value: self.value,
            observed_at: self.observed_at,
            raw_path: self.raw_path.as_deref(),
        }
    }
}

/// Inserts observations, ignoring ones already stored.
///
/// All chunks share one transaction: either every new pixel is stored or, on
/// any failure, none is. Returns the number of rows actually inserted.
pub async fn persist<R: AsObservationRow>(
    db: &Database,
    records: &[R],
) -> Result<u64, SatelliteError> {
    if records.is_empty() {
        return Ok(0);
    }

    let result = insert_all(db, records).await;
    match &result {
        Ok(inserted) => info!(
            "Stored {} of {} satellite observations",
            inserted,
            records.len()
        ),
        Err(e) => error!("Satellite batch rolled back: {}", e),
    }
    result
}

async fn insert_all<R: AsObservationRow>(
    db: &Database,
    records: &[R],
) -> Result<u64, SatelliteError> {
    let mut transaction = db.pool().begin().await.map_err(SatelliteError::Database)?;
    let mut inserted = 0;

    for chunk in records.chunks(CHUNK_SIZE) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT INTO satellite_observations \
             (product, parameter, latitude, longitude, value, unit, observed_at, raw_path) ",
        );
        qb.push_values(chunk, |mut values, record| {
            let row = record.as_row();
            values
                .push_bind(row.product)
                .push_bind(row.parameter)
                .push_bind(row.latitude)
                .push_bind(row.longitude)
                .push_bind(row.value)
                .push_bind(row.unit)
                .push_bind(row.observed_at)
                .push_bind(row.raw_path);
        });
        qb.push(" ON CONFLICT DO NOTHING");

        let done = qb
            .build()
            .execute(&mut *transaction)
            .await
            .map_err(SatelliteError::Database)?;
        inserted += done.rows_affected();
    }

    // Dropping an uncommitted transaction rolls it back.
    transaction.commit().await.map_err(SatelliteError::Database)?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::satellite::product::ProductKind;
    use chrono::{TimeZone, Utc};

    fn pixel(latitude: f64, value: f64) -> SatelliteRecord {
        SatelliteRecord {
            product: ProductKind::TropomiNo2,
            latitude,
            longitude: -74.05,
            value,
            observed_at: Utc.with_ymd_and_hms(2025, 1, 10, 17, 5, 0).single(),
            raw_path: Some("S5P.nc".to_string()),
        }
    }

    async fn row_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM satellite_observations")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn repeated_batches_are_ignored() {
        let db = Database::in_memory().await.unwrap();
        let records: Vec<_> = (0..250).map(|i| pixel(4.0 + i as f64 * 0.01, 1.0)).collect();

        assert_eq!(persist(&db, &records).await.unwrap(), 250);
        assert_eq!(persist(&db, &records).await.unwrap(), 0);
        assert_eq!(row_count(&db).await, 250);
    }

    #[tokio::test]
    async fn pixels_without_timestamp_are_deduplicated_too() {
        let db = Database::in_memory().await.unwrap();
        let mut record = pixel(4.7, 2.0);
        record.observed_at = None;

        persist(&db, &[record.clone()]).await.unwrap();
        persist(&db, &[record]).await.unwrap();

        assert_eq!(row_count(&db).await, 1);
    }

    #[tokio::test]
    async fn failing_chunk_rolls_back_the_whole_batch() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_far_pixels BEFORE INSERT ON satellite_observations
             WHEN NEW.latitude > 5.1 BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();
        // Only pixels in the second chunk cross the trigger's latitude.
        let records: Vec<_> = (0..150).map(|i| pixel(4.0 + i as f64 * 0.01, 1.0)).collect();

        assert!(persist(&db, &records).await.is_err());
        assert_eq!(row_count(&db).await, 0);
    }
}
