use crate::config::ConfigError;
use crate::db::DbError;
use crate::features::FeatureError;
use crate::http::HttpError;
use crate::measurements::MeasurementError;
use crate::satellite::SatelliteError;
use crate::stations::StationError;
use crate::weather::WeatherError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error(transparent)]
    Satellite(#[from] SatelliteError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("Failed to create directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),
}
