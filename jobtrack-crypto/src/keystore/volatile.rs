//! In-memory key storage, for tests and hosts without durable storage.

use crate::key::FieldKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-memory key map keyed by user id.
///
/// Clones share one map; separately constructed stores never see each
/// other's keys.
#[derive(Clone)]
pub struct VolatileKeyStore {
    keys: Arc<RwLock<HashMap<String, FieldKey>>>,
}

impl VolatileKeyStore {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Retrieves a clone of the user's key handle.
    pub async fn get_key(&self, user_id: &str) -> Option<FieldKey> {
        self.keys.read().await.get(user_id).cloned()
    }

    /// Stores (or replaces) the user's key handle.
    pub async fn set_key(&self, user_id: &str, key: FieldKey) {
        self.keys.write().await.insert(user_id.to_string(), key);
    }

    /// Drops the user's key handle, returning whether one was held.
    pub async fn remove_key(&self, user_id: &str) -> bool {
        self.keys.write().await.remove(user_id).is_some()
    }

    /// Returns the number of users with a stored key.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

impl Default for VolatileKeyStore {
    fn default() -> Self {
        Self::new()
    }
}
