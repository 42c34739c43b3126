use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Failed to rebuild model features")]
    Database(#[from] sqlx::Error),
}
