use crate::db::Database;
use crate::features::error::FeatureError;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::FromRow;

/// One row per (timestamp, station coordinate) seen in `measurements`, with the
/// pollutants pivoted into columns and the weather at the same place and time.
const ASSEMBLE_FEATURES: &str = "
INSERT INTO model_features
    (observed_at, latitude, longitude, pm25, no2, o3, temperature, wind_speed, other_features)
SELECT
    k.observed_at,
    s.latitude,
    s.longitude,
    pm25.value,
    no2.value,
    o3.value,
    w.temperature,
    w.wind_speed,
    json_object(
        'pm10', pm10.value,
        'co', co.value,
        'so2', so2.value,
        'humidity', w.humidity,
        'wind_direction', w.wind_direction,
        'pressure', w.pressure
    )
FROM (SELECT DISTINCT station_id, observed_at FROM measurements) AS k
JOIN stations s ON s.id = k.station_id
LEFT JOIN measurements pm25
    ON pm25.station_id = k.station_id AND pm25.observed_at = k.observed_at AND pm25.parameter = 'pm25'
LEFT JOIN measurements no2
    ON no2.station_id = k.station_id AND no2.observed_at = k.observed_at AND no2.parameter = 'no2'
LEFT JOIN measurements o3
    ON o3.station_id = k.station_id AND o3.observed_at = k.observed_at AND o3.parameter = 'o3'
LEFT JOIN measurements pm10
    ON pm10.station_id = k.station_id AND pm10.observed_at = k.observed_at AND pm10.parameter = 'pm10'
LEFT JOIN measurements co
    ON co.station_id = k.station_id AND co.observed_at = k.observed_at AND co.parameter = 'co'
LEFT JOIN measurements so2
    ON so2.station_id = k.station_id AND so2.observed_at = k.observed_at AND so2.parameter = 'so2'
LEFT JOIN weather_observations w
    ON w.latitude = s.latitude AND w.longitude = s.longitude AND w.observed_at = k.observed_at
WHERE s.latitude IS NOT NULL AND s.longitude IS NOT NULL
ON CONFLICT (observed_at, latitude, longitude) DO UPDATE SET
    pm25 = excluded.pm25,
    no2 = excluded.no2,
    o3 = excluded.o3,
    temperature = excluded.temperature,
    wind_speed = excluded.wind_speed,
    other_features = excluded.other_features
";

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FeatureRow {
    pub observed_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub pm25: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    /// JSON object with pm10, co, so2, humidity, wind_direction and pressure.
    pub other_features: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    db: Database,
}

impl FeatureAssembler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Rebuilds `model_features` from scratch in one transaction.
    ///
    /// Any failure leaves the previous table untouched. Returns the row count.
    pub async fn assemble(&self) -> Result<u64, FeatureError> {
        let mut transaction = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM model_features")
            .execute(&mut *transaction)
            .await?;
        sqlx::query(ASSEMBLE_FEATURES)
            .execute(&mut *transaction)
            .await?;
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM model_features")
            .fetch_one(&mut *transaction)
            .await?;

        transaction.commit().await?;
        info!("model_features rebuilt with {} rows", rows);
        Ok(u64::try_from(rows).unwrap_or_default())
    }

    /// Every feature row, oldest first.
    pub async fn rows(&self) -> Result<Vec<FeatureRow>, FeatureError> {
        let rows = sqlx::query_as::<_, FeatureRow>(
            "SELECT observed_at, latitude, longitude, pm25, no2, o3, temperature, wind_speed, other_features
             FROM model_features ORDER BY observed_at, latitude, longitude",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::upsert;
    use crate::stations::ensure_virtual_station;
    use crate::types::measurement::NewMeasurement;
    use crate::types::parameter::Parameter;
    use crate::types::provider::Provider;
    use chrono::TimeZone;
    use serde_json::Value;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, hour, 0, 0).unwrap()
    }

    async fn reading(db: &Database, station: i64, hour: u32, parameter: Parameter, value: f64) {
        let measurement = NewMeasurement {
            observed_at: at(hour),
            parameter,
            value,
            unit: None,
            source: Provider::OpenAq,
        };
        upsert(db, station, &measurement).await.unwrap();
    }

    async fn seeded() -> Database {
        let db = Database::in_memory().await.unwrap();
        let station = ensure_virtual_station(&db, "Usaquen", "OpenAQ", 4.7, -74.03)
            .await
            .unwrap();
        reading(&db, station, 5, Parameter::Pm25, 12.0).await;
        reading(&db, station, 5, Parameter::No2, 20.0).await;
        reading(&db, station, 5, Parameter::Pm10, 30.0).await;
        reading(&db, station, 6, Parameter::O3, 40.0).await;

        sqlx::query(
            "INSERT INTO weather_observations
                (observed_at, latitude, longitude, temperature, humidity, wind_speed, wind_direction, pressure, source)
             VALUES (?, 4.7, -74.03, 14.5, 80.0, 2.0, 90.0, 1020.0, 'OpenWeather')",
        )
        .bind(at(5))
        .execute(db.pool())
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn pivots_parameters_and_joins_weather() {
        let assembler = FeatureAssembler::new(seeded().await);

        assert_eq!(assembler.assemble().await.unwrap(), 2);
        let rows = assembler.rows().await.unwrap();

        let first = &rows[0];
        assert_eq!(first.observed_at, at(5));
        assert_eq!((first.latitude, first.longitude), (4.7, -74.03));
        assert_eq!(first.pm25, Some(12.0));
        assert_eq!(first.no2, Some(20.0));
        assert_eq!(first.o3, None);
        assert_eq!(first.temperature, Some(14.5));
        let other: Value = serde_json::from_str(first.other_features.as_deref().unwrap()).unwrap();
        assert_eq!(other["pm10"], 30.0);
        assert_eq!(other["pressure"], 1020.0);
        assert!(other["co"].is_null());

        let second = &rows[1];
        assert_eq!(second.o3, Some(40.0));
        assert_eq!(second.temperature, None);
    }

    #[tokio::test]
    async fn rerunning_gives_the_same_table() {
        let assembler = FeatureAssembler::new(seeded().await);

        assembler.assemble().await.unwrap();
        let before = assembler.rows().await.unwrap();
        assembler.assemble().await.unwrap();

        assert_eq!(assembler.rows().await.unwrap(), before);
    }

    #[tokio::test]
    async fn stale_rows_disappear_on_rebuild() {
        let db = seeded().await;
        let assembler = FeatureAssembler::new(db.clone());
        assembler.assemble().await.unwrap();

        sqlx::query("DELETE FROM measurements WHERE parameter = 'o3'")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(assembler.assemble().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stations_without_coordinates_produce_no_rows() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO stations (provider_id, name, kind, source) VALUES ('9', 'Nowhere', 'station', 'OpenAQ')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        reading(&db, 1, 5, Parameter::Pm25, 1.0).await;

        assert_eq!(FeatureAssembler::new(db).assemble().await.unwrap(), 0);
    }
}
