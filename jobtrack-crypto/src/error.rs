//! Crypto and key-store error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by the primitive layer and the key lifecycle manager.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Empty password, empty user id, or unusable KDF parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Authentication tag mismatch or malformed ciphertext.
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown key storage strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key storage error: {0}")]
    Storage(String),
}

impl From<duckdb::Error> for CryptoError {
    fn from(err: duckdb::Error) -> Self {
        CryptoError::Storage(err.to_string())
    }
}
