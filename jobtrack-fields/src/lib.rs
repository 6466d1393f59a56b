//! Field-level encryption for JobTrack records.
//!
//! Provides:
//! - A static registry of which entity fields are sensitive
//! - A dynamically typed record model that maps to and from JSON documents
//! - Middleware that encrypts sensitive fields before storage and decrypts
//!   them after reads, with strict and lenient failure policies
//! - An explicit per-user session that binds the key at login and drops it
//!   at logout
//!
//! Identifiers and fields used for querying stay plaintext so the store can
//! still filter and join on them.

pub mod config;
pub mod error;
pub mod middleware;
pub mod record;
pub mod registry;
pub mod session;

pub use config::FieldCryptoConfig;
pub use error::{FieldError, FieldResult};
pub use middleware::{
    BatchDecryptOutcome, DECRYPT_WARNING, DEFAULT_ENCRYPTED_LENGTH_THRESHOLD, DecryptMode,
    DecryptReport, ENCRYPTED_MARKER, FieldCrypto, FieldFailure, has_sensitive_values,
    is_encrypted_record,
};
pub use record::{FieldValue, Record};
pub use registry::{EntityType, fields_for, nested_fields, public_fields, timestamp_fields};
pub use session::{FieldSession, LoginOutcome, SessionState};
