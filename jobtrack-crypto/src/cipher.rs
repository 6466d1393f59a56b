//! AES-256-GCM sealing of strings and JSON values.
//!
//! Encrypted Field Value format:
//! `base64( IV:12 || AES-GCM( [u32 LE length][utf-8 data][zero padding] ) )`
//!
//! The length-framed plaintext is padded to a multiple of 16 bytes, so the
//! shortest possible value is 60 base64 characters.

use crate::error::{CryptoError, CryptoResult};
use crate::key::FieldKey;
use aes_gcm::Nonce;
use aes_gcm::aead::Aead;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

/// AES-GCM IV length in bytes.
pub const IV_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

const LENGTH_PREFIX_SIZE: usize = 4;
const FRAME_BLOCK: usize = 16;

/// Length in characters of the shortest Encrypted Field Value.
pub const MIN_ENCODED_LEN: usize = (IV_SIZE + TAG_SIZE + FRAME_BLOCK).div_ceil(3) * 4;

fn frame(data: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let len = u32::try_from(data.len()).map_err(|_| {
        CryptoError::Encryption(format!("plaintext too large: {} bytes", data.len()))
    })?;
    let framed_len = (LENGTH_PREFIX_SIZE + data.len()).div_ceil(FRAME_BLOCK) * FRAME_BLOCK;

    let mut framed = Zeroizing::new(vec![0u8; framed_len]);
    framed[..LENGTH_PREFIX_SIZE].copy_from_slice(&len.to_le_bytes());
    framed[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + data.len()].copy_from_slice(data);
    Ok(framed)
}

fn unframe(framed: &[u8]) -> CryptoResult<Vec<u8>> {
    if framed.len() < LENGTH_PREFIX_SIZE {
        return Err(CryptoError::DecryptionFailure(
            "framed plaintext missing length prefix".to_string(),
        ));
    }
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&framed[..LENGTH_PREFIX_SIZE]);
    let len = u32::from_le_bytes(prefix) as usize;

    let available = framed.len() - LENGTH_PREFIX_SIZE;
    if len > available {
        return Err(CryptoError::DecryptionFailure(format!(
            "framed length {len} exceeds available {available} bytes"
        )));
    }
    Ok(framed[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len].to_vec())
}

fn seal(key: &FieldKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let framed = frame(data)?;

    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&iv), framed.as_slice())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open(key: &FieldKey, blob: &[u8]) -> CryptoResult<Vec<u8>> {
    if blob.len() < IV_SIZE {
        return Err(CryptoError::DecryptionFailure(format!(
            "encrypted value is {} bytes, shorter than the {IV_SIZE}-byte IV",
            blob.len()
        )));
    }
    if blob.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::DecryptionFailure(
            "encrypted value missing authentication tag".to_string(),
        ));
    }

    let (iv, ciphertext) = blob.split_at(IV_SIZE);
    let framed = Zeroizing::new(
        key.cipher()
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| {
                CryptoError::DecryptionFailure(
                    "authentication failed (wrong key or tampered data)".to_string(),
                )
            })?,
    );
    unframe(&framed)
}

/// Encrypts a string into a self-contained Encrypted Field Value.
///
/// A fresh random IV is used on every call, so equal plaintexts never
/// produce equal outputs.
pub fn encrypt_string(plaintext: &str, key: &FieldKey) -> CryptoResult<String> {
    let blob = seal(key, plaintext.as_bytes())?;
    Ok(BASE64.encode(blob))
}

/// Decrypts an Encrypted Field Value produced by [`encrypt_string`].
pub fn decrypt_string(encoded: &str, key: &FieldKey) -> CryptoResult<String> {
    let blob = BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| CryptoError::DecryptionFailure(format!("invalid base64: {e}")))?;
    let plaintext = open(key, &blob)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::DecryptionFailure("plaintext is not valid UTF-8".to_string()))
}

/// Serializes `value` to JSON and encrypts it.
///
/// chrono timestamps serialize as ISO-8601 strings; [`decrypt_object`] does
/// not turn them back into timestamps unless the target type asks for it.
pub fn encrypt_object<T: Serialize + ?Sized>(value: &T, key: &FieldKey) -> CryptoResult<String> {
    let json = Zeroizing::new(serde_json::to_string(value)?);
    encrypt_string(&json, key)
}

/// Decrypts and deserializes a value produced by [`encrypt_object`].
pub fn decrypt_object<T: DeserializeOwned>(encoded: &str, key: &FieldKey) -> CryptoResult<T> {
    let json = Zeroizing::new(decrypt_string(encoded, key)?);
    Ok(serde_json::from_str(&json)?)
}

/// Shape check for stored values: standard base64 and longer than
/// `threshold` characters.
///
/// This is a heuristic. A long base64-looking plaintext note is
/// indistinguishable from ciphertext by shape alone.
pub fn looks_encrypted(candidate: &str, threshold: usize) -> bool {
    candidate.len() > threshold && BASE64.decode(candidate.as_bytes()).is_ok()
}
