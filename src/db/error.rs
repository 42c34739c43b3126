use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid database URL '{0}'")]
    InvalidUrl(String, #[source] sqlx::Error),

    #[error("Failed to open database '{0}'")]
    Connect(String, #[source] sqlx::Error),

    #[error("Failed to create table {table}")]
    Schema {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },
}
