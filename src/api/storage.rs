//! Token and session persistence.
//!
//! `SecureStore` is the capability every backend implements. The backend is
//! chosen once, when the client is built:
//! - `KeychainStore` uses the OS credential store via `keyring` (macOS Keychain,
//!   Windows Credential Manager, Linux kernel keyutils).
//! - `FileStore` is the non-secure fallback for hosts without a credential store.
//! - `MemoryStore` keeps everything in process memory (tests, throwaway sessions).
//!
//! `TokenStorage` layers the three logical keys on top of whichever backend is in use.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;
use zeroize::Zeroizing;

use super::session::SessionSnapshot;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const SESSION_KEY: &str = "session_snapshot";

/// Default keychain service name.
pub const DEFAULT_SERVICE_NAME: &str = "uz.lccrm.student";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Keychain operation failed: {0}")]
    Keychain(String),
    #[error("Token file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<keyring::Error> for StorageError {
    fn from(err: keyring::Error) -> Self {
        StorageError::Keychain(err.to_string())
    }
}

/// Asynchronous key-value store for credentials.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Returns `None` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Idempotent: deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// ── Keychain ─────────────────────────────────────────────────────────────

/// OS credential store, one entry per logical key under a shared service name.
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

#[async_trait]
impl SecureStore for KeychainStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::from(e)),
        }
    }
}

// ── File fallback ────────────────────────────────────────────────────────

/// Plain JSON map on disk. Not encrypted; only for hosts lacking a credential store.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// `<data dir>/lccrm-student/credentials.json`, or the working directory
    /// when the platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lccrm-student")
            .join("credentials.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let raw = Zeroizing::new(serde_json::to_string(map)?);
        tokio::fs::write(&tmp, raw.as_bytes()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}

// ── Memory ───────────────────────────────────────────────────────────────

/// Process-local store. Values are zeroized when overwritten or removed.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Zeroizing<String>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()
            .insert(key.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).map(|v| String::clone(v)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

// ── Logical keys ─────────────────────────────────────────────────────────

/// Access/refresh token pair plus the last-known session snapshot.
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct TokenStorage {
    store: Arc<dyn SecureStore>,
}

impl TokenStorage {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    /// Storage backed by a fresh `MemoryStore`.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get(REFRESH_TOKEN_KEY).await
    }

    /// Persist a new token pair.
    ///
    /// If the refresh token cannot be written, the previous access token is put
    /// back so the stored pair is never half-updated.
    pub async fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StorageError> {
        let previous = self.store.get(ACCESS_TOKEN_KEY).await?;
        self.store.set(ACCESS_TOKEN_KEY, access).await?;

        if let Err(e) = self.store.set(REFRESH_TOKEN_KEY, refresh).await {
            let restored = match previous {
                Some(ref old) => self.store.set(ACCESS_TOKEN_KEY, old).await,
                None => self.store.delete(ACCESS_TOKEN_KEY).await,
            };
            if let Err(restore_err) = restored {
                log::error!("Failed to roll back access token: {}", restore_err);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Persist an access token on its own (login payloads that carry no refresh token).
    pub async fn set_access_token(&self, access: &str) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, access).await
    }

    /// Store `access` as the only credential, dropping any refresh token.
    ///
    /// Used when a login yields no refresh token, so a refresh token from an
    /// earlier session can never be paired with the new access token.
    pub async fn replace_with_access_token(&self, access: &str) -> Result<(), StorageError> {
        self.store.delete(REFRESH_TOKEN_KEY).await?;
        self.store.set(ACCESS_TOKEN_KEY, access).await
    }

    /// Delete both tokens. Both deletions are attempted; the first error is returned.
    pub async fn clear_tokens(&self) -> Result<(), StorageError> {
        let access = self.store.delete(ACCESS_TOKEN_KEY).await;
        let refresh = self.store.delete(REFRESH_TOKEN_KEY).await;
        access.and(refresh)
    }

    pub async fn session(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        match self.store.get(SESSION_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save_session(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let raw = serde_json::to_string(snapshot)?;
        self.store.set(SESSION_KEY, &raw).await
    }

    pub async fn clear_session(&self) -> Result<(), StorageError> {
        self.store.delete(SESSION_KEY).await
    }

    /// Remove every trace of the session. All deletions are attempted.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let tokens = self.clear_tokens().await;
        let session = self.clear_session().await;
        tokens.and(session)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::api::language::Language;

    /// Store that refuses to write the refresh token once armed.
    struct FailingRefreshStore {
        inner: MemoryStore,
        fail: AtomicBool,
    }

    #[async_trait]
    impl SecureStore for FailingRefreshStore {
        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == REFRESH_TOKEN_KEY && self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Keychain("locked".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let store = FileStore::new(&path);
        store.set(ACCESS_TOKEN_KEY, "a1").await.unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("a1"));
        assert_eq!(reopened.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("r1"));

        reopened.delete(ACCESS_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        store.delete(ACCESS_TOKEN_KEY).await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(ACCESS_TOKEN_KEY).await,
            Err(StorageError::Corrupt(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileStore::new(&path).set("k", "v").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_token_storage_pair() {
        let tokens = TokenStorage::in_memory();
        assert_eq!(tokens.access_token().await.unwrap(), None);

        tokens.set_tokens("a1", "r1").await.unwrap();
        assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("a1"));
        assert_eq!(tokens.refresh_token().await.unwrap().as_deref(), Some("r1"));

        tokens.clear_tokens().await.unwrap();
        assert_eq!(tokens.access_token().await.unwrap(), None);
        assert_eq!(tokens.refresh_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_with_access_token_drops_old_refresh() {
        let tokens = TokenStorage::in_memory();
        tokens.set_tokens("a_old", "r_old").await.unwrap();

        tokens.replace_with_access_token("t_new").await.unwrap();
        assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("t_new"));
        assert_eq!(tokens.refresh_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_tokens_rolls_back_on_partial_failure() {
        let store = Arc::new(FailingRefreshStore {
            inner: MemoryStore::new(),
            fail: AtomicBool::new(false),
        });
        let tokens = TokenStorage::new(store.clone());
        tokens.set_tokens("a1", "r1").await.unwrap();

        store.fail.store(true, Ordering::SeqCst);
        assert!(tokens.set_tokens("a2", "r2").await.is_err());

        assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("a1"));
        assert_eq!(tokens.refresh_token().await.unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_set_tokens_rollback_without_previous_pair() {
        let store = Arc::new(FailingRefreshStore {
            inner: MemoryStore::new(),
            fail: AtomicBool::new(true),
        });
        let tokens = TokenStorage::new(store);
        assert!(tokens.set_tokens("a1", "r1").await.is_err());
        assert_eq!(tokens.access_token().await.unwrap(), None);
        assert_eq!(tokens.refresh_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_snapshot_roundtrip_and_clear_all() {
        let tokens = TokenStorage::in_memory();
        let snapshot = SessionSnapshot {
            username: "student1".to_string(),
            user_id: Some(42),
            profile: None,
            language: Language::Ru,
        };
        tokens.set_tokens("a1", "r1").await.unwrap();
        tokens.save_session(&snapshot).await.unwrap();
        assert_eq!(tokens.session().await.unwrap(), Some(snapshot));

        tokens.clear_all().await.unwrap();
        assert_eq!(tokens.session().await.unwrap(), None);
        assert_eq!(tokens.access_token().await.unwrap(), None);
        assert_eq!(tokens.refresh_token().await.unwrap(), None);
    }
}
