use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OracleError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle has no answer for {0}")]
    NoAnswer(String),

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),

    #[error("Enrichment cancelled")]
    Cancelled,

    #[error("Enrichment deadline exceeded")]
    DeadlineExceeded,
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
