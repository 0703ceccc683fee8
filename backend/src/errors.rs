use thiserror::Error;

use crate::external::price_provider::PriceProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("External error: {0}")]
    External(String),
    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<PriceProviderError> for AppError {
    fn from(value: PriceProviderError) -> Self {
        AppError::External(value.to_string())
    }
}
