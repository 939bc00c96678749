//! Error types for marga-nav

use thiserror::Error;

use crate::core::frames::TransformError;

/// marga-nav error type
#[derive(Error, Debug)]
pub enum MargaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<toml::de::Error> for MargaError {
    fn from(e: toml::de::Error) -> Self {
        MargaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MargaError>;
