//! Per-user encryption session.
//!
//! `FieldSession` is owned by the authentication layer. Login derives the
//! user's key and hands it to the [`KeyManager`]; every record operation
//! fetches the handle from the manager and runs the middleware with it;
//! logout removes the handle.
//!
//! ```text
//! NoKey --login ok--> KeyActive --logout--> NoKey
//!   ^                                          |
//!   +------------- derivation failure ---------+
//! ```
//!
//! Without an active key, operations on records that hold sensitive values
//! fail with [`FieldError::KeyUnavailable`]; they never fall back to
//! plaintext storage.

use crate::config::FieldCryptoConfig;
use crate::error::{FieldError, FieldResult};
use crate::middleware::{
    BatchDecryptOutcome, ENCRYPTED_MARKER, FieldCrypto, has_sensitive_values, is_encrypted_record,
};
use crate::record::Record;
use crate::registry::EntityType;
use jobtrack_crypto::{FieldKey, KeyManager, derive_user_key};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NoKey,
    KeyActive,
}

/// Result of binding a key at login.
///
/// Authentication has already succeeded when this is produced; a key that
/// could not be derived only disables encrypted storage for the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    KeyActive,
    SecureFeaturesUnavailable { reason: String },
}

impl LoginOutcome {
    pub fn is_active(&self) -> bool {
        matches!(self, LoginOutcome::KeyActive)
    }
}

/// Encryption context for one signed-in user.
pub struct FieldSession {
    config: FieldCryptoConfig,
    keys: KeyManager,
    active_user: RwLock<Option<String>>,
}

impl FieldSession {
    /// Creates a session over a (possibly shared) key manager.
    pub fn new(keys: KeyManager, config: FieldCryptoConfig) -> Self {
        Self {
            config,
            keys,
            active_user: RwLock::new(None),
        }
    }

    /// Creates a session with its own key manager built from `config`.
    pub fn open(config: FieldCryptoConfig) -> FieldResult<Self> {
        let keys = KeyManager::open(&config.key_store_config())?;
        Ok(Self::new(keys, config))
    }

    pub fn config(&self) -> &FieldCryptoConfig {
        &self.config
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.keys
    }

    /// Derives the user's key and makes it the session key.
    ///
    /// Derivation runs on a blocking worker. On failure the session is left
    /// in `NoKey` and the outcome says why.
    pub async fn login(&self, password: &str, user_id: &str) -> LoginOutcome {
        let params = self.config.kdf_params();
        let password = Zeroizing::new(password.to_string());
        let uid = user_id.to_string();
        let derived =
            tokio::task::spawn_blocking(move || derive_user_key(&password, &uid, &params)).await;

        let key = match derived {
            Ok(Ok(key)) => key,
            Ok(Err(e)) => return self.key_unavailable(user_id, e.to_string()).await,
            Err(e) => {
                return self
                    .key_unavailable(user_id, format!("key derivation task failed: {e}"))
                    .await;
            }
        };

        if let Err(e) = self.keys.set_key(user_id, key).await {
            return self.key_unavailable(user_id, e.to_string()).await;
        }

        let previous = self.active_user.write().await.replace(user_id.to_string());
        if let Some(previous) = previous.filter(|p| p != user_id) {
            self.forget(&previous).await;
        }
        info!("field encryption active for user {user_id}");
        LoginOutcome::KeyActive
    }

    /// Discards the session key. Logging out with no key is a no-op.
    pub async fn logout(&self) -> FieldResult<()> {
        let Some(user_id) = self.active_user.write().await.take() else {
            return Ok(());
        };
        self.keys.remove_key(&user_id).await?;
        info!("field encryption ended for user {user_id}");
        Ok(())
    }

    /// Adopts a key the manager already holds for `user_id`, e.g. one the
    /// durable strategy persisted before a restart.
    pub async fn resume(&self, user_id: &str) -> FieldResult<SessionState> {
        match self.keys.get_key(user_id).await? {
            Some(_) => {
                *self.active_user.write().await = Some(user_id.to_string());
                info!("resumed field encryption for user {user_id}");
                Ok(SessionState::KeyActive)
            }
            None => {
                *self.active_user.write().await = None;
                debug!("no stored field key to resume for user {user_id}");
                Ok(SessionState::NoKey)
            }
        }
    }

    pub async fn state(&self) -> SessionState {
        if self.has_key().await {
            SessionState::KeyActive
        } else {
            SessionState::NoKey
        }
    }

    pub async fn user_id(&self) -> Option<String> {
        self.active_user.read().await.clone()
    }

    /// Whether an active user exists and the manager still holds their key.
    pub async fn has_key(&self) -> bool {
        matches!(self.active_key().await, Ok(Some(_)))
    }

    pub async fn encrypt_for_storage(
        &self,
        record: &Record,
        entity_type: EntityType,
    ) -> FieldResult<Record> {
        if !has_sensitive_values(record, entity_type) {
            return Ok(marked(record));
        }
        let key = self.require_key().await?;
        self.crypto(&key)
            .encrypt_for_storage(record, entity_type)
            .await
    }

    pub async fn decrypt_from_storage(
        &self,
        record: &Record,
        entity_type: EntityType,
    ) -> FieldResult<Record> {
        if !has_sensitive_values(record, entity_type) {
            return Ok(unmarked(record));
        }
        let key = self.require_key().await?;
        self.crypto(&key)
            .decrypt_from_storage(record, entity_type)
            .await
    }

    pub async fn encrypt_many(
        &self,
        records: &[Record],
        entity_type: EntityType,
    ) -> FieldResult<Vec<Record>> {
        if !records.iter().any(|r| has_sensitive_values(r, entity_type)) {
            return Ok(records.iter().map(marked).collect());
        }
        let key = self.require_key().await?;
        self.crypto(&key).encrypt_batch(records, entity_type).await
    }

    pub async fn decrypt_many(
        &self,
        records: &[Record],
        entity_type: EntityType,
    ) -> FieldResult<BatchDecryptOutcome> {
        if !records.iter().any(|r| has_sensitive_values(r, entity_type)) {
            return Ok(BatchDecryptOutcome {
                records: records.iter().map(unmarked).collect(),
                ..Default::default()
            });
        }
        let key = self.require_key().await?;
        self.crypto(&key).decrypt_batch(records, entity_type).await
    }

    /// Shape check only; does not need a key.
    pub fn is_encrypted(&self, record: &Record, entity_type: EntityType) -> bool {
        is_encrypted_record(record, entity_type, self.config.encrypted_length_threshold)
    }

    fn crypto<'k>(&self, key: &'k FieldKey) -> FieldCrypto<'k> {
        FieldCrypto::with_config(key, &self.config)
    }

    async fn active_key(&self) -> FieldResult<Option<FieldKey>> {
        let Some(user_id) = self.active_user.read().await.clone() else {
            return Ok(None);
        };
        Ok(self.keys.get_key(&user_id).await?)
    }

    async fn require_key(&self) -> FieldResult<FieldKey> {
        self.active_key().await?.ok_or(FieldError::KeyUnavailable)
    }

    async fn key_unavailable(&self, user_id: &str, reason: String) -> LoginOutcome {
        warn!("secure features unavailable for user {user_id}: {reason}");
        let previous = self.active_user.write().await.take();
        if let Some(previous) = previous {
            self.forget(&previous).await;
        }
        LoginOutcome::SecureFeaturesUnavailable { reason }
    }

    async fn forget(&self, user_id: &str) {
        if let Err(e) = self.keys.remove_key(user_id).await {
            warn!("failed to remove field key for user {user_id}: {e}");
        }
    }
}

// Records with nothing to encrypt skip the key lookup but keep the same
// marker contract as the middleware.
fn marked(record: &Record) -> Record {
    let mut out = record.clone();
    out.insert(ENCRYPTED_MARKER, true);
    out
}

fn unmarked(record: &Record) -> Record {
    let mut out = record.clone();
    out.remove(ENCRYPTED_MARKER);
    out
}
