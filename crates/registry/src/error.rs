//! Registry store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid package: {0}")]
    Invalid(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<meshix_core::Error> for RegistryError {
    fn from(err: meshix_core::Error) -> Self {
        Self::Invalid(err.to_string())
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
