//! Token persistence.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::token::{unix_now, TokenRecord};

/// Default token file, relative to the working directory.
pub const DEFAULT_TOKEN_FILE: &str = ".token";

/// Error during token persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing stored at the location.
    #[error("No token file found at {0}")]
    NotFound(String),

    /// The location exists but holds no data.
    #[error("Token file {0} is empty")]
    Empty(String),

    /// The stored record is past its `expires_at`.
    #[error("Token has expired (expires_at {expires_at}, now {now})")]
    Expired {
        /// Stored expiry.
        expires_at: f64,
        /// Time of the check.
        now: f64,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data is not a token record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persists a single token record.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored record, rejecting missing, empty or expired ones.
    async fn load(&self) -> Result<TokenRecord, StoreError>;

    /// Replace the stored record.
    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError>;

    /// Remove the stored record. Removing nothing is not an error.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Shared handle to a token store.
pub type BoxedTokenStore = Arc<dyn TokenStore>;

fn check_expiry(record: TokenRecord) -> Result<TokenRecord, StoreError> {
    let now = unix_now();
    match record.expires_at {
        Some(expires_at) if expires_at <= now => Err(StoreError::Expired { expires_at, now }),
        _ => Ok(record),
    }
}

/// Token store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_FILE)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<TokenRecord, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.display()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        if content.trim().is_empty() {
            return Err(StoreError::Empty(self.display()));
        }

        let record: TokenRecord = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "Loaded token record");
        check_expiry(record)
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string(record)?;
        tokio::fs::write(&self.path, content).await?;
        debug!(path = %self.path.display(), "Saved token record");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// In-memory token store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenStore {
    record: Arc<RwLock<Option<TokenRecord>>>,
    saves: Arc<RwLock<Vec<TokenRecord>>>,
}

impl InMemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a record.
    pub fn with_record(record: TokenRecord) -> Self {
        let store = Self::new();
        *store.record.write() = Some(record);
        store
    }

    /// Every record passed to `save`, oldest first.
    pub fn saved(&self) -> Vec<TokenRecord> {
        self.saves.read().clone()
    }

    /// The current record, without expiry checks.
    pub fn current(&self) -> Option<TokenRecord> {
        self.record.read().clone()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self) -> Result<TokenRecord, StoreError> {
        let record = self
            .record
            .read()
            .clone()
            .ok_or_else(|| StoreError::NotFound("memory".to_string()))?;
        check_expiry(record)
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        *self.record.write() = Some(record.clone());
        self.saves.write().push(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.record.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_store() -> (tempfile::TempDir, FileTokenStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join(".token"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (_dir, store) = temp_store();
        let record = TokenRecord::new("test_token");

        store.save(&record).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_record() {
        let (_dir, store) = temp_store();
        store.save(&TokenRecord::new("first")).await.unwrap();
        store.save(&TokenRecord::new("second")).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let (_dir, store) = temp_store();
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_empty_file() {
        let (_dir, store) = temp_store();
        tokio::fs::write(store.path(), "").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Empty(_)));
    }

    #[tokio::test]
    async fn test_load_expired_record() {
        let (_dir, store) = temp_store();
        let record = TokenRecord::new("stale").with_expires_at(unix_now() - 3600.0);
        store.save(&record).await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Expired { .. }));
    }

    #[tokio::test]
    async fn test_load_unexpired_record() {
        let (_dir, store) = temp_store();
        let record = TokenRecord::new("fresh").with_expires_at(unix_now() + 3600.0);
        store.save(&record).await.unwrap();

        assert_eq!(store.load().await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_load_record_without_expiry_is_verbatim() {
        let (_dir, store) = temp_store();
        tokio::fs::write(
            store.path(),
            r#"{"access_token":"test_token","token_type":"Bearer","player":"p1"}"#,
        )
        .await
        .unwrap();

        let first = store.load().await.unwrap();
        let second = store.load().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.access_token.as_deref(), Some("test_token"));
        assert_eq!(first.extra.get("player"), Some(&serde_json::json!("p1")));
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let (_dir, store) = temp_store();
        tokio::fs::write(store.path(), "not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/dir/.token"));
        store.save(&TokenRecord::new("t")).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, store) = temp_store();
        store.save(&TokenRecord::new("t")).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(matches!(store.load().await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryTokenStore::new();
        assert!(matches!(store.load().await, Err(StoreError::NotFound(_))));

        let record = TokenRecord::new("mem");
        store.save(&record).await.unwrap();
        assert_eq!(store.load().await.unwrap(), record);
        assert_eq!(store.saved(), vec![record]);
    }

    #[tokio::test]
    async fn test_in_memory_store_rejects_expired() {
        let store =
            InMemoryTokenStore::with_record(TokenRecord::new("old").with_expires_at(1.0));
        assert!(matches!(store.load().await, Err(StoreError::Expired { .. })));
    }
}
