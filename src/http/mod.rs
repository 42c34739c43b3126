//! JSON-over-HTTP access to the upstream providers: a single-attempt transport
//! and a retrying client layered on top of it.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{RetryPolicy, RetryingClient};
pub use error::HttpError;
pub use transport::{ApiRequest, ReqwestTransport, Transport, REQUEST_TIMEOUT};
