//! Durable key storage backed by a local DuckDB file.
//!
//! Key handles are written as opaque blobs into the host database and read
//! back into handles; the bytes never pass through a public API. Lookups go
//! through a read-mostly in-memory cache that only changes at login/logout.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{FieldKey, KEY_SIZE};
use chrono::Utc;
use duckdb::{Connection, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use zeroize::Zeroizing;

const KEY_TABLE: &str = "field_keys";

/// Key store whose handles survive process restarts.
///
/// Key material is stored as raw, unencrypted bytes in the database file.
/// Anyone who can read that file can read every persisted key, so it must
/// live somewhere only the signed-in user can access.
///
/// Cache misses and removals run under the cache write lock, so a removed
/// key can't be loaded back into the cache by a lookup that was already
/// in progress.
#[derive(Clone)]
pub struct DurableKeyStore {
    conn: Arc<Mutex<Connection>>,
    cache: Arc<RwLock<HashMap<String, FieldKey>>>,
}

impl DurableKeyStore {
    /// Opens (or creates) the key database at `path`.
    pub fn open(path: &Path) -> CryptoResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a key database that lives only as long as this store.
    pub fn open_in_memory() -> CryptoResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> CryptoResult<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {KEY_TABLE} (
                user_id VARCHAR PRIMARY KEY,
                key_material BLOB NOT NULL,
                created_at BIGINT NOT NULL
            );"
        ))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Retrieves the user's key handle, loading it from disk on a cache miss.
    pub async fn get_key(&self, user_id: &str) -> CryptoResult<Option<FieldKey>> {
        if let Some(key) = self.cache.read().await.get(user_id) {
            return Ok(Some(key.clone()));
        }

        let mut cache = self.cache.write().await;
        if let Some(key) = cache.get(user_id) {
            return Ok(Some(key.clone()));
        }

        let loaded = self.load(user_id).inspect_err(|e| {
            warn!("failed to load field key for user {user_id}: {e}");
        })?;

        if let Some(ref key) = loaded {
            debug!("loaded persisted field key for user {user_id}");
            cache.insert(user_id.to_string(), key.clone());
        }
        Ok(loaded)
    }

    /// Persists the user's key handle, replacing any previous one.
    pub async fn set_key(&self, user_id: &str, key: FieldKey) -> CryptoResult<()> {
        let mut cache = self.cache.write().await;
        self.persist(user_id, &key)?;
        cache.insert(user_id.to_string(), key);
        debug!("persisted field key for user {user_id}");
        Ok(())
    }

    /// Deletes the user's key handle from disk and cache.
    pub async fn remove_key(&self, user_id: &str) -> CryptoResult<bool> {
        let mut cache = self.cache.write().await;
        let deleted = self.delete(user_id)?;
        let cached = cache.remove(user_id).is_some();
        Ok(deleted || cached)
    }

    /// Whether the backing database still answers queries.
    pub fn is_available(&self) -> bool {
        let Ok(conn) = self.conn.lock() else {
            return false;
        };
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0)).is_ok()
    }

    fn load(&self, user_id: &str) -> CryptoResult<Option<FieldKey>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CryptoError::Storage(e.to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT key_material FROM {KEY_TABLE} WHERE user_id = ?"
        ))?;
        let mut rows = stmt.query(params![user_id])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let material: Zeroizing<Vec<u8>> = Zeroizing::new(row.get(0)?);
        let bytes: [u8; KEY_SIZE] = material.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "stored key for user {user_id} is {} bytes, expected {KEY_SIZE}",
                material.len()
            ))
        })?;
        Ok(Some(FieldKey::from_bytes(bytes)))
    }

    fn persist(&self, user_id: &str, key: &FieldKey) -> CryptoResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CryptoError::Storage(e.to_string()))?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {KEY_TABLE} (user_id, key_material, created_at)
                 VALUES (?, ?, ?)"
            ),
            params![user_id, key.expose().to_vec(), Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn delete(&self, user_id: &str) -> CryptoResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CryptoError::Storage(e.to_string()))?;
        let affected = conn.execute(
            &format!("DELETE FROM {KEY_TABLE} WHERE user_id = ?"),
            params![user_id],
        )?;
        Ok(affected > 0)
    }

    #[cfg(test)]
    pub(crate) fn write_raw(&self, user_id: &str, material: &[u8]) -> CryptoResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CryptoError::Storage(e.to_string()))?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {KEY_TABLE} (user_id, key_material, created_at)
                 VALUES (?, ?, 0)"
            ),
            params![user_id, material.to_vec()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{decrypt_string, encrypt_string};
    use crate::key::generate_random_key;

    #[tokio::test]
    async fn persisted_key_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.duckdb");
        let key = generate_random_key();
        let sealed = encrypt_string("remember me", &key).unwrap();

        {
            let store = DurableKeyStore::open(&path).unwrap();
            store.set_key("user-1", key).await.unwrap();
        }

        let reopened = DurableKeyStore::open(&path).unwrap();
        let restored = reopened.get_key("user-1").await.unwrap().unwrap();
        assert_eq!(decrypt_string(&sealed, &restored).unwrap(), "remember me");
    }

    #[tokio::test]
    async fn corrupt_material_is_invalid_key() {
        let store = DurableKeyStore::open_in_memory().unwrap();
        store.write_raw("user-1", &[1, 2, 3]).unwrap();
        let err = store.get_key("user-1").await.unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn remove_clears_disk_and_cache() {
        let store = DurableKeyStore::open_in_memory().unwrap();
        store.set_key("user-1", generate_random_key()).await.unwrap();
        assert!(store.remove_key("user-1").await.unwrap());
        assert!(store.get_key("user-1").await.unwrap().is_none());
        assert!(!store.remove_key("user-1").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn removed_key_not_reloaded_by_concurrent_reads() {
        let store = DurableKeyStore::open_in_memory().unwrap();

        for round in 0..20 {
            let user = format!("user-{round}");
            store.set_key(&user, generate_random_key()).await.unwrap();
            // Start from an empty cache so readers take the disk path
            store.cache.write().await.clear();

            let readers: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    let user = user.clone();
                    tokio::spawn(async move { store.get_key(&user).await })
                })
                .collect();
            let remover = {
                let store = store.clone();
                let user = user.clone();
                tokio::spawn(async move { store.remove_key(&user).await })
            };

            remover.await.unwrap().unwrap();
            for reader in readers {
                reader.await.unwrap().unwrap();
            }
            assert!(store.get_key(&user).await.unwrap().is_none(), "round {round}");
            assert!(!store.cache.read().await.contains_key(&user));
        }
    }

    #[test]
    fn fresh_store_is_available() {
        let store = DurableKeyStore::open_in_memory().unwrap();
        assert!(store.is_available());
    }
}
