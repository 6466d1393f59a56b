//! Field encryption primitives and key lifecycle for JobTrack.
//!
//! Provides:
//! - PBKDF2-HMAC-SHA256 key derivation from a password and user id
//! - AES-256-GCM sealing of strings and JSON values into base64 field values
//! - Opaque, non-extractable key handles with zeroization
//! - Per-user key storage with durable (DuckDB) or volatile strategies
//!
//! # Key derivation
//!
//! The salt is the first 16 bytes of SHA-256(user id). Logging in again with
//! the same password on any device re-derives the same key, so nothing about
//! the key has to be stored server-side.

mod cipher;
mod error;
mod key;
pub mod keystore;

pub use cipher::{
    IV_SIZE, MIN_ENCODED_LEN, TAG_SIZE, decrypt_object, decrypt_string, encrypt_object,
    encrypt_string, looks_encrypted,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    FieldKey, KEY_SIZE, KdfParams, MIN_ITERATIONS, RANDOM_SALT_SIZE, Salt, USER_SALT_SIZE,
    derive_key, derive_user_key, generate_random_key, generate_salt,
};
pub use keystore::{DurableKeyStore, KeyManager, KeyStoreConfig, KeyStrategy, VolatileKeyStore};
