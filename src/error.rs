use thiserror::Error;

pub type Result<T, E = WriterError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration for channel {index}: {reason}")]
    InvalidChannel { index: usize, reason: String },
    #[error("invalid device profile: {0}")]
    InvalidProfile(String),
    #[error("channel {channel} expected {expected} samples per record, got {actual}")]
    SampleCount {
        channel: usize,
        expected: usize,
        actual: usize,
    },
    #[error("header fields can only be written once, before any samples")]
    HeaderAlreadyWritten,
    #[error("writer is already closed")]
    Closed,
    #[error("failed to parse input: {0}")]
    Parse(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
