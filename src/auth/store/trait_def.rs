//! Credential store trait.

use crate::auth::error::AuthError;
use std::sync::Arc;

/// Trait for credential storage backends.
///
/// A flat string key-value surface: the auth core only needs get, set and
/// delete-by-key. All implementations must be thread-safe (`Send + Sync`).
pub trait CredentialStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// Delete `key`. Returns whether a value was present.
    fn remove(&self, key: &str) -> Result<bool, AuthError>;

    /// Check if a non-empty value exists under `key`.
    fn contains(&self, key: &str) -> Result<bool, AuthError> {
        Ok(self.get(key)?.is_some_and(|v| !v.is_empty()))
    }

    /// Get the name of this storage backend.
    fn name(&self) -> &str;
}

// Blanket implementation for Arc<T>
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        (**self).set(key, value)
    }
    fn remove(&self, key: &str) -> Result<bool, AuthError> {
        (**self).remove(key)
    }
    fn contains(&self, key: &str) -> Result<bool, AuthError> {
        (**self).contains(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

// Blanket implementation for Box<T>
impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        (**self).set(key, value)
    }
    fn remove(&self, key: &str) -> Result<bool, AuthError> {
        (**self).remove(key)
    }
    fn contains(&self, key: &str) -> Result<bool, AuthError> {
        (**self).contains(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
