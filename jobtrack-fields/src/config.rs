//! Field encryption configuration.

use crate::middleware::{DEFAULT_ENCRYPTED_LENGTH_THRESHOLD, DecryptMode};
use jobtrack_crypto::{KdfParams, KeyStoreConfig, MIN_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for field encryption and key storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldCryptoConfig {
    /// PBKDF2 iteration count used at login.
    pub kdf_iterations: u32,

    /// Key storage strategy: `"durable"` or `"volatile"`.
    pub key_strategy: String,

    /// Database file for the durable strategy.
    pub key_db_path: Option<PathBuf>,

    /// Stored text longer than this that decodes as base64 is treated as
    /// an Encrypted Field Value by `is_encrypted`.
    pub encrypted_length_threshold: usize,

    /// Failure policy for single-record reads.
    pub single_record_mode: DecryptMode,

    /// Failure policy for batch reads.
    pub batch_mode: DecryptMode,
}

impl Default for FieldCryptoConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: MIN_ITERATIONS,
            key_strategy: "volatile".to_string(),
            key_db_path: None,
            encrypted_length_threshold: DEFAULT_ENCRYPTED_LENGTH_THRESHOLD,
            single_record_mode: DecryptMode::Strict,
            batch_mode: DecryptMode::Lenient,
        }
    }
}

impl FieldCryptoConfig {
    pub fn key_store_config(&self) -> KeyStoreConfig {
        KeyStoreConfig {
            strategy: self.key_strategy.clone(),
            db_path: self.key_db_path.clone(),
        }
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            iterations: self.kdf_iterations,
        }
    }
}
