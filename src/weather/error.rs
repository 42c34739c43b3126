use crate::http::HttpError;
use crate::stations::StationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("OPENWEATHER_API_KEY is not set")]
    MissingApiKey,

    #[error("OpenWeather request failed")]
    Request(#[source] HttpError),

    #[error("Failed to parse OpenWeather response")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to store weather observation")]
    Database(#[source] sqlx::Error),

    #[error(transparent)]
    Station(#[from] StationError),
}
