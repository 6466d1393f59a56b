//! Field middleware error types.

use crate::registry::EntityType;
use jobtrack_crypto::CryptoError;
use thiserror::Error;

/// Result type for field middleware operations.
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors raised by the registry, the middleware, and the session.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// A sensitive field failed to decrypt. `field` is a dotted path for
    /// nested records, e.g. `events[1].title`.
    #[error("failed to decrypt {entity_type} field {field}: {source}")]
    FieldDecryptionFailure {
        entity_type: EntityType,
        field: String,
        source: CryptoError,
    },

    #[error("no field key available for the current session")]
    KeyUnavailable,

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
