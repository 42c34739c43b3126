//! The station directory: which OpenAQ locations exist for the configured
//! region and which of them are still reporting.

pub mod directory;
pub mod error;
pub mod store;

pub use directory::{filter_active, ListingPolicy, StationDirectory};
pub use error::StationError;
pub use store::ensure_virtual_station;
