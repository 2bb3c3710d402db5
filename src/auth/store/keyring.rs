//! Keyring-based credential storage.

use super::CredentialStore;
use crate::auth::error::AuthError;
use tracing::instrument;

/// Keyring-based credential storage.
///
/// Uses the system's native credential store; every slot is its own keyring
/// entry under a shared service name.
///
/// Feature-gated behind `system-keyring`.
#[cfg(feature = "system-keyring")]
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    /// Service name for keyring entries.
    service: String,
}

#[cfg(feature = "system-keyring")]
impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "system-keyring")]
impl KeyringCredentialStore {
    /// Service name for keyring entries.
    const SERVICE_NAME: &str = "wcportal";

    /// Create a new KeyringCredentialStore with default service name.
    pub fn new() -> Self {
        Self {
            service: Self::SERVICE_NAME.to_string(),
        }
    }

    /// Create a KeyringCredentialStore with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Check if the system keyring is available.
    pub fn is_available() -> bool {
        match keyring::Entry::new("wcportal-test", "availability-check") {
            Ok(entry) => match entry.get_password() {
                Ok(_) => true,
                Err(keyring::Error::NoEntry) => true,
                Err(keyring::Error::NoStorageAccess(_)) => false,
                Err(keyring::Error::PlatformFailure(_)) => false,
                Err(_) => true,
            },
            Err(_) => false,
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, AuthError> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| AuthError::Storage(format!("Failed to create keyring entry: {}", e)))
    }
}

#[cfg(feature = "system-keyring")]
impl CredentialStore for KeyringCredentialStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Keyring error: {}", e))),
        }
    }

    #[instrument(skip(self, value))]
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| AuthError::Storage(format!("Keyring error: {}", e)))
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<bool, AuthError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(AuthError::Storage(format!("Keyring error: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
