//! OpenWeather snapshots for the configured coordinate.

pub mod error;
pub mod ingester;

pub use error::WeatherError;
pub use ingester::{WeatherIngester, POLLUTION_STATION};
