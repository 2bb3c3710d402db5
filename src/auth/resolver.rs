//! Active identity resolution.

use std::sync::Arc;

use super::IdentityClass;
use super::credentials::{self, CredentialRecord};
use super::error::AuthError;
use super::store::CredentialStore;

/// Ordered list of identity classes, highest priority first.
///
/// The store may hold leftover credentials for several classes; scanning
/// them in one fixed order keeps the resolved identity stable across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPriority(Vec<IdentityClass>);

impl IdentityPriority {
    /// Build a priority list. Duplicates and empty lists are rejected;
    /// classes left out are never resolved.
    pub fn new(order: Vec<IdentityClass>) -> Result<Self, AuthError> {
        if order.is_empty() {
            return Err(AuthError::InvalidPriority("list is empty".to_string()));
        }
        for (i, class) in order.iter().enumerate() {
            if order[..i].contains(class) {
                return Err(AuthError::InvalidPriority(format!("{class} listed twice")));
            }
        }
        Ok(Self(order))
    }

    pub fn classes(&self) -> &[IdentityClass] {
        &self.0
    }
}

impl Default for IdentityPriority {
    /// Admin, then Student, then Teacher.
    fn default() -> Self {
        Self(IdentityClass::ALL.to_vec())
    }
}

/// Determines the single currently active identity. Pure read.
#[derive(Clone)]
pub struct AuthResolver {
    store: Arc<dyn CredentialStore>,
    priority: IdentityPriority,
}

impl AuthResolver {
    pub fn new(store: Arc<dyn CredentialStore>, priority: IdentityPriority) -> Self {
        Self { store, priority }
    }

    /// First class, in priority order, holding a non-empty access token.
    pub fn resolve_active(&self) -> Result<Option<CredentialRecord>, AuthError> {
        for class in self.priority.classes() {
            if let Some(record) = credentials::read_record(self.store.as_ref(), *class)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Every class with a stored access token, in priority order.
    pub fn resolve_all(&self) -> Result<Vec<CredentialRecord>, AuthError> {
        let mut records = Vec::new();
        for class in self.priority.classes() {
            if let Some(record) = credentials::read_record(self.store.as_ref(), *class)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn priority(&self) -> &IdentityPriority {
        &self.priority
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }
}

impl std::fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResolver")
            .field("store", &self.store.name())
            .field("priority", &self.priority)
            .finish()
    }
}
