//! Error types for lumenchain

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error("Hash mismatch at block {0}")]
    HashMismatch(u64),
    #[error("Linkage mismatch at block {0}")]
    LinkageMismatch(u64),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Bincode error: {0}")]
    BincodeError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::BincodeError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
