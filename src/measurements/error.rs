use crate::http::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("Measurement feed request failed")]
    Feed(#[source] HttpError),

    #[error("Failed to parse measurement page")]
    Decode(#[source] serde_json::Error),
}
