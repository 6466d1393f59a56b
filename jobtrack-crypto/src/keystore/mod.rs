//! Key lifecycle manager: strategy-selectable storage of per-user key handles.
//!
//! The handle is written at login, read by every encrypt/decrypt call during
//! the session, and removed at logout. Callers go through [`KeyManager`] and
//! never depend on which strategy is active.

mod durable;
mod volatile;

pub use durable::DurableKeyStore;
pub use volatile::VolatileKeyStore;

use crate::error::{CryptoError, CryptoResult};
use crate::key::FieldKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Where key handles live between page loads / process restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Host database; the handle survives a restart.
    Durable,
    /// Process memory only.
    Volatile,
}

impl KeyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStrategy::Durable => "durable",
            KeyStrategy::Volatile => "volatile",
        }
    }
}

impl fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyStrategy {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "durable" => Ok(KeyStrategy::Durable),
            "volatile" => Ok(KeyStrategy::Volatile),
            other => Err(CryptoError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Key storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyStoreConfig {
    /// Strategy name: `"durable"` or `"volatile"`.
    pub strategy: String,

    /// Database file for the durable strategy.
    pub db_path: Option<PathBuf>,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            strategy: KeyStrategy::Volatile.as_str().to_string(),
            db_path: None,
        }
    }
}

/// Per-user key handle storage with a strategy chosen at construction.
#[derive(Clone)]
pub enum KeyManager {
    Durable(DurableKeyStore),
    Volatile(VolatileKeyStore),
}

impl KeyManager {
    /// Builds a manager from configuration.
    ///
    /// Fails with `UnknownStrategy` for an unrecognized strategy name, and
    /// with `InvalidInput` if the durable strategy has no database path.
    pub fn open(config: &KeyStoreConfig) -> CryptoResult<Self> {
        match config.strategy.parse::<KeyStrategy>()? {
            KeyStrategy::Durable => {
                let path = config.db_path.as_ref().ok_or_else(|| {
                    CryptoError::InvalidInput(
                        "durable key storage requires db_path".to_string(),
                    )
                })?;
                Ok(KeyManager::Durable(DurableKeyStore::open(path)?))
            }
            KeyStrategy::Volatile => Ok(KeyManager::Volatile(VolatileKeyStore::new())),
        }
    }

    /// Builds a manager by strategy name, with durable storage in memory.
    pub fn with_strategy(name: &str) -> CryptoResult<Self> {
        match name.parse::<KeyStrategy>()? {
            KeyStrategy::Durable => Ok(KeyManager::Durable(DurableKeyStore::open_in_memory()?)),
            KeyStrategy::Volatile => Ok(KeyManager::Volatile(VolatileKeyStore::new())),
        }
    }

    pub fn volatile() -> Self {
        KeyManager::Volatile(VolatileKeyStore::new())
    }

    pub fn strategy(&self) -> KeyStrategy {
        match self {
            KeyManager::Durable(_) => KeyStrategy::Durable,
            KeyManager::Volatile(_) => KeyStrategy::Volatile,
        }
    }

    /// Returns the user's key handle, if one is stored.
    pub async fn get_key(&self, user_id: &str) -> CryptoResult<Option<FieldKey>> {
        match self {
            KeyManager::Durable(store) => store.get_key(user_id).await,
            KeyManager::Volatile(store) => Ok(store.get_key(user_id).await),
        }
    }

    /// Stores the user's key handle, replacing any previous one.
    pub async fn set_key(&self, user_id: &str, key: FieldKey) -> CryptoResult<()> {
        if user_id.is_empty() {
            return Err(CryptoError::InvalidKey(
                "key must be bound to a non-empty user id".to_string(),
            ));
        }
        match self {
            KeyManager::Durable(store) => store.set_key(user_id, key).await?,
            KeyManager::Volatile(store) => store.set_key(user_id, key).await,
        }
        debug!("stored field key for user {user_id} ({})", self.strategy());
        Ok(())
    }

    /// Removes the user's key handle. Removing an absent key is not an error.
    pub async fn remove_key(&self, user_id: &str) -> CryptoResult<()> {
        let removed = match self {
            KeyManager::Durable(store) => store.remove_key(user_id).await?,
            KeyManager::Volatile(store) => store.remove_key(user_id).await,
        };
        if removed {
            debug!("removed field key for user {user_id} ({})", self.strategy());
        }
        Ok(())
    }

    /// Whether the backing storage can currently hold keys.
    pub fn is_available(&self) -> bool {
        match self {
            KeyManager::Durable(store) => store.is_available(),
            KeyManager::Volatile(_) => true,
        }
    }
}
