//! Key handles, salts, and password-based key derivation.

use crate::error::{CryptoError, CryptoResult};
use aes_gcm::{Aes256Gcm, Key, KeyInit};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Length of the salt derived from a user identifier.
pub const USER_SALT_SIZE: usize = 16;

/// Length of a randomly generated salt.
pub const RANDOM_SALT_SIZE: usize = 32;

/// Lowest PBKDF2 round count accepted by [`derive_key`].
pub const MIN_ITERATIONS: u32 = 100_000;

/// Opaque symmetric key handle bound to AES-256-GCM.
///
/// The raw key material is never handed out by the public API: the handle
/// cannot be serialized, compared, or printed. Clones share nothing; each
/// copy zeroizes its own buffer on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey {
    bytes: [u8; KEY_SIZE],
}

impl FieldKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Raw key material, for the durable key store only.
    pub(crate) fn expose(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub(crate) fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes))
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldKey(<redacted>)")
    }
}

/// Salt fed into PBKDF2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Deterministic per-user salt: the first 16 bytes of SHA-256(user id).
    ///
    /// Re-deriving with the same password and user id yields the same key
    /// without a server-stored salt.
    pub fn for_user(user_id: &str) -> CryptoResult<Self> {
        if user_id.is_empty() {
            return Err(CryptoError::InvalidInput(
                "user id must not be empty".to_string(),
            ));
        }
        let digest = Sha256::digest(user_id.as_bytes());
        Ok(Self(digest[..USER_SALT_SIZE].to_vec()))
    }

    /// Fresh random salt of [`RANDOM_SALT_SIZE`] bytes.
    pub fn random() -> Self {
        Self(generate_salt().to_vec())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// PBKDF2-HMAC-SHA256 parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_ITERATIONS,
        }
    }
}

/// Returns [`RANDOM_SALT_SIZE`] random bytes.
pub fn generate_salt() -> [u8; RANDOM_SALT_SIZE] {
    let mut salt = [0u8; RANDOM_SALT_SIZE];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Generates a random key for ephemeral use (no password re-derivation).
pub fn generate_random_key() -> FieldKey {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    rand::rng().fill_bytes(bytes.as_mut());
    FieldKey::from_bytes(*bytes)
}

/// Derives a 256-bit key from a password with PBKDF2-HMAC-SHA256.
///
/// Deterministic for a given (password, salt, params). The handle cannot be
/// compared directly; equivalence is observable only by cross-decryption.
pub fn derive_key(password: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<FieldKey> {
    if password.is_empty() {
        return Err(CryptoError::InvalidInput(
            "password must not be empty".to_string(),
        ));
    }
    if salt.is_empty() {
        return Err(CryptoError::InvalidInput("salt must not be empty".to_string()));
    }
    if params.iterations < MIN_ITERATIONS {
        return Err(CryptoError::InvalidInput(format!(
            "PBKDF2 iterations must be at least {MIN_ITERATIONS}, got {}",
            params.iterations
        )));
    }

    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        params.iterations,
        out.as_mut(),
    );
    Ok(FieldKey::from_bytes(*out))
}

/// Derives the key for a user from their password and user identifier.
pub fn derive_user_key(
    password: &str,
    user_id: &str,
    params: &KdfParams,
) -> CryptoResult<FieldKey> {
    if password.is_empty() {
        return Err(CryptoError::InvalidInput(
            "password must not be empty".to_string(),
        ));
    }
    let salt = Salt::for_user(user_id)?;
    derive_key(password, &salt, params)
}
