use crate::db::Database;
use crate::http::{ApiRequest, ReqwestTransport, RetryingClient, Transport};
use crate::measurements::upsert;
use crate::stations::ensure_virtual_station;
use crate::types::measurement::NewMeasurement;
use crate::types::parameter::Parameter;
use crate::types::provider::Provider;
use crate::types::weather::{CurrentWeather, PollutionResponse, WeatherObservation};
use crate::weather::error::WeatherError;
use chrono::DateTime;
use log::{info, warn};
use serde_json::Value;
use tokio::sync::OnceCell;

pub const OPENWEATHER_CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const OPENWEATHER_POLLUTION_URL: &str =
    "https://api.openweathermap.org/data/2.5/air_pollution";

/// Virtual station the air-pollution series is recorded against.
pub const POLLUTION_STATION: &str = "OpenWeather_air";

const POLLUTION_UNIT: &str = "µg/m3";

/// Fetches current weather and air pollution for one fixed coordinate.
#[derive(Debug)]
pub struct WeatherIngester<T = ReqwestTransport> {
    client: RetryingClient<T>,
    db: Database,
    api_key: Option<String>,
    latitude: f64,
    longitude: f64,
    pollution_station: OnceCell<i64>,
}

impl<T: Transport> WeatherIngester<T> {
    pub fn new(
        client: RetryingClient<T>,
        db: Database,
        api_key: Option<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            client,
            db,
            api_key,
            latitude,
            longitude,
            pollution_station: OnceCell::new(),
        }
    }

    /// Stores one current-weather snapshot. Returns the number of rows added,
    /// zero when the snapshot was already stored or the body was unusable.
    pub async fn fetch_current(&self) -> Result<u64, WeatherError> {
        let request = self.request(OPENWEATHER_CURRENT_URL)?.query("units", "metric");
        let body = self
            .client
            .get(&request)
            .await
            .map_err(WeatherError::Request)?;

        if body.get("main").is_none() {
            warn!("Unexpected OpenWeather current response: {}", body);
            return Ok(0);
        }
        let current: CurrentWeather = serde_json::from_value(body).map_err(WeatherError::Decode)?;
        let Some(observation) = current.into_observation(
            self.latitude,
            self.longitude,
            Provider::OpenWeather.as_str(),
        ) else {
            warn!("OpenWeather current response has an invalid timestamp");
            return Ok(0);
        };

        let inserted = self.insert_observation(&observation).await?;
        info!(
            "OpenWeather current at {} stored ({} new)",
            observation.observed_at, inserted
        );
        Ok(inserted)
    }

    /// Stores the CO and NO2 components of the pollution series as readings of
    /// the [`POLLUTION_STATION`]. Returns how many readings were written.
    pub async fn fetch_pollution(&self) -> Result<usize, WeatherError> {
        let request = self.request(OPENWEATHER_POLLUTION_URL)?;
        let body: Value = self
            .client
            .get(&request)
            .await
            .map_err(WeatherError::Request)?;
        let response: PollutionResponse =
            serde_json::from_value(body).map_err(WeatherError::Decode)?;

        let station_id = self.pollution_station().await?;
        let mut stored = 0;
        for sample in &response.list {
            let Some(observed_at) = DateTime::from_timestamp(sample.dt, 0) else {
                warn!("Skipping pollution sample with invalid time {}", sample.dt);
                continue;
            };
            let components = [
                (Parameter::Co, sample.components.co),
                (Parameter::No2, sample.components.no2),
            ];
            for (parameter, value) in components {
                let Some(value) = value else {
                    continue;
                };
                let measurement = NewMeasurement {
                    observed_at,
                    parameter,
                    value,
                    unit: Some(POLLUTION_UNIT.to_string()),
                    source: Provider::OpenWeather,
                };
                match upsert(&self.db, station_id, &measurement).await {
                    Ok(()) => stored += 1,
                    Err(e) => warn!("Failed to store {} at {}: {}", parameter, observed_at, e),
                }
            }
        }
        info!(
            "OpenWeather air pollution: {} readings from {} samples",
            stored,
            response.list.len()
        );
        Ok(stored)
    }

    fn request(&self, url: &str) -> Result<ApiRequest, WeatherError> {
        let key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        Ok(ApiRequest::new(url)
            .query("lat", self.latitude)
            .query("lon", self.longitude)
            .query("appid", key))
    }

    async fn pollution_station(&self) -> Result<i64, WeatherError> {
        let id = self
            .pollution_station
            .get_or_try_init(|| {
                ensure_virtual_station(
                    &self.db,
                    POLLUTION_STATION,
                    Provider::OpenWeather.as_str(),
                    self.latitude,
                    self.longitude,
                )
            })
            .await?;
        Ok(*id)
    }

    async fn insert_observation(&self, observation: &WeatherObservation) -> Result<u64, WeatherError> {
        let done = sqlx::query(
            "INSERT INTO weather_observations
                (observed_at, latitude, longitude, temperature, humidity,
                 wind_speed, wind_direction, pressure, source)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(observation.observed_at)
        .bind(observation.latitude)
        .bind(observation.longitude)
        .bind(observation.temperature)
        .bind(observation.humidity)
        .bind(observation.wind_speed)
        .bind(observation.wind_direction)
        .bind(observation.pressure)
        .bind(&observation.source)
        .execute(self.db.pool())
        .await
        .map_err(WeatherError::Database)?;
        Ok(done.rows_affected())
    }
}
