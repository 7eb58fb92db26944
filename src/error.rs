//! Error types for stack operations

use thiserror::Error;

/// Main error type for stack operations
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Malformed date: {0}")]
    MalformedDate(String),

    #[error("Empty index: {0}")]
    EmptyIndex(String),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Unknown epoch: {0}")]
    UnknownEpoch(String),

    #[error("Unknown pair: {0}")]
    UnknownPair(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Ill-formed matrix: {0}")]
    IllFormedMatrix(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid container format: {0}")]
    InvalidFormat(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid data type: expected {expected}, found {found}")]
    InvalidDataType { expected: String, found: String },

    #[error("Container opened read-only: {0}")]
    ReadOnly(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized Result type for stack operations
pub type Result<T> = std::result::Result<T, StackError>;

impl From<bincode::Error> for StackError {
    fn from(err: bincode::Error) -> Self {
        StackError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::Serialization(err.to_string())
    }
}
