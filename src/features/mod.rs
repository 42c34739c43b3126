//! The denormalized `model_features` table, rebuilt from measurements and weather.

pub mod assembler;
pub mod error;

pub use assembler::{FeatureAssembler, FeatureRow};
pub use error::FeatureError;
