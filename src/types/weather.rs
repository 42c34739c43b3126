//! OpenWeather response shapes and the stored weather observation.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Body of the OpenWeather current-weather endpoint (`units=metric`).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CurrentWeather {
    /// Observation time, unix seconds.
    pub dt: i64,
    pub main: WeatherMain,
    #[serde(default)]
    pub wind: Wind,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WeatherMain {
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Wind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
}

/// Body of the OpenWeather air-pollution endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PollutionResponse {
    #[serde(default)]
    pub list: Vec<PollutionSample>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PollutionSample {
    pub dt: i64,
    #[serde(default)]
    pub components: PollutionComponents,
}

/// The stored component concentrations in µg/m³; the others are ignored.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct PollutionComponents {
    pub co: Option<f64>,
    pub no2: Option<f64>,
}

/// A row of `weather_observations`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub observed_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub pressure: Option<f64>,
    pub source: String,
}

impl CurrentWeather {
    /// Pins the snapshot to the configured coordinate. `None` if `dt` is out of range.
    pub fn into_observation(
        self,
        latitude: f64,
        longitude: f64,
        source: &str,
    ) -> Option<WeatherObservation> {
        Some(WeatherObservation {
            observed_at: DateTime::from_timestamp(self.dt, 0)?,
            latitude,
            longitude,
            temperature: self.main.temp,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg,
            pressure: self.main.pressure,
            source: source.to_string(),
        })
    }
}
