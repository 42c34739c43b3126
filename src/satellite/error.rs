use crate::satellite::product::ProductKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SatelliteError {
    #[error("Failed to build download client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Granule file id '{0}' needs a granule base URL")]
    MissingBaseUrl(String),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to create granule directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to write granule '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to open granule '{0}': {1}")]
    Open(PathBuf, String),

    #[error("Failed to read variable '{variable}': {message}")]
    ReadVariable { variable: String, message: String },

    #[error("Array sizes disagree for {product}: latitude {latitude}, longitude {longitude}, values {values}, qa {qa:?}")]
    ShapeMismatch {
        product: ProductKind,
        latitude: usize,
        longitude: usize,
        values: usize,
        qa: Option<usize>,
    },

    #[error("Failed to read observation CSV '{0}'")]
    Csv(PathBuf, #[source] csv::Error),

    #[error("Cannot decode '{0}': built without the `netcdf` feature")]
    Unsupported(PathBuf),

    #[error("Failed to store satellite observations")]
    Database(#[source] sqlx::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
