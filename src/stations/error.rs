use crate::http::HttpError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Station listing request failed")]
    Listing(#[source] HttpError),

    #[error("Failed to parse station listing")]
    Decode(#[source] serde_json::Error),

    #[error("Still rate limited after waiting {waited:?}")]
    RateLimitExhausted { waited: Duration },

    #[error("Failed to read or write stations")]
    Database(#[source] sqlx::Error),
}
