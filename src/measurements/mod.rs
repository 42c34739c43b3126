//! Historical OpenAQ readings for the stations in the directory.

pub mod error;
pub mod ingester;
pub mod store;

pub use error::MeasurementError;
pub use ingester::{FeedPolicy, IngestSummary, MeasurementIngester};
pub use store::upsert;
