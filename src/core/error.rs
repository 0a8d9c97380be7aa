use std::path::PathBuf;
use thiserror::Error;

pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Coarse classification handed to whatever transport sits in front of the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Delimited file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to decode {} as UTF-8 text: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("Row {row}: missing value for required column '{column}'")]
    MissingField { row: u64, column: String },

    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: u64, reason: String },

    #[error("Invalid column name: {0:?}")]
    InvalidColumnName(String),

    #[error("Invalid conversion request: {0}")]
    InvalidRequest(String),

    #[error("Input file {} is {size} bytes, limit is {limit}", path.display())]
    InputTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Conversion cancelled")]
    Cancelled,

    #[error("Conversion exceeded its time limit of {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Failed to serialize graph: {0}")]
    Serialization(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Io { path: path.into(), source }
    }
}
