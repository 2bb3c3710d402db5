//! In-memory credential storage.

use super::CredentialStore;
use crate::auth::error::AuthError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// In-memory credential storage.
///
/// Uses `Arc<RwLock<HashMap>>` for thread-safe access. Useful for
/// testing and ephemeral sessions. The storage is Clone and clones share
/// the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCredentialStore {
    /// Create a new empty MemoryCredentialStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given slots.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Get the number of occupied slots.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if storage is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Remove every slot.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl CredentialStore for MemoryCredentialStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.inner.read().get(key).cloned())
    }

    #[instrument(skip(self, value))]
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.inner.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<bool, AuthError> {
        Ok(self.inner.write().remove(key).is_some())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_new_is_empty() {
        let store = MemoryCredentialStore::new();
        assert!(store.get("accessToken").unwrap().is_none());
        assert!(!store.contains("accessToken").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_set_get_remove() {
        let store = MemoryCredentialStore::new();
        store.set("studentAccessToken", "abc").unwrap();
        assert_eq!(store.get("studentAccessToken").unwrap().as_deref(), Some("abc"));
        assert!(store.remove("studentAccessToken").unwrap());
        assert!(!store.remove("studentAccessToken").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_clones_share_slots() {
        let store = MemoryCredentialStore::with_entries([("accessToken", "a")]);
        let other = store.clone();
        other.set("refreshToken", "r").unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_empty_value_is_not_contained() {
        let store = MemoryCredentialStore::with_entries([("accessToken", "")]);
        assert!(!store.contains("accessToken").unwrap());
    }
}
