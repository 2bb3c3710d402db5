//! Credential records and the slot operations performed on them.
//!
//! Only three writers touch these slots: the login flow ([`save_login`]),
//! the refresh coordinator ([`store_refreshed`]) and session invalidation
//! ([`clear_class`], [`clear_all`]).

use super::IdentityClass;
use super::error::AuthError;
use super::jwt;
use super::store::CredentialStore;
use serde::Serialize;

/// Slot recording the class of the most recent login.
pub const LAST_LOGIN_KEY: &str = "lastLoginType";

/// Stored credentials of one identity class.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    pub class: IdentityClass,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl CredentialRecord {
    /// Expiry of the access token as a Unix timestamp, when the token is a
    /// JWT carrying an `exp` claim.
    pub fn access_expires_at(&self) -> Option<i64> {
        jwt::peek_claims(&self.access_token).and_then(|c| c.exp)
    }

    /// Whether the access token's `exp` claim lies in the past.
    pub fn is_access_expired(&self) -> bool {
        self.access_expires_at()
            .is_some_and(|exp| exp <= chrono::Utc::now().timestamp())
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("class", &self.class)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Read the record for `class`. Returns `None` when no access token is stored.
pub fn read_record(
    store: &dyn CredentialStore,
    class: IdentityClass,
) -> Result<Option<CredentialRecord>, AuthError> {
    let Some(access_token) = non_empty(store.get(class.access_key())?) else {
        return Ok(None);
    };
    let refresh_token = non_empty(store.get(class.refresh_key())?);
    Ok(Some(CredentialRecord {
        class,
        access_token,
        refresh_token,
    }))
}

/// Persist the tokens returned by a successful login for `class`.
pub fn save_login(
    store: &dyn CredentialStore,
    class: IdentityClass,
    access_token: &str,
    refresh_token: Option<&str>,
) -> Result<(), AuthError> {
    store.set(class.access_key(), access_token)?;
    match refresh_token {
        Some(refresh) if !refresh.is_empty() => store.set(class.refresh_key(), refresh)?,
        _ => {
            store.remove(class.refresh_key())?;
        }
    }
    store.set(LAST_LOGIN_KEY, class.as_str())
}

/// Overwrite the access token of `class` after a refresh. A rotated refresh
/// token replaces the stored one.
pub fn store_refreshed(
    store: &dyn CredentialStore,
    class: IdentityClass,
    access_token: &str,
    rotated_refresh: Option<&str>,
) -> Result<(), AuthError> {
    store.set(class.access_key(), access_token)?;
    if let Some(refresh) = rotated_refresh.filter(|r| !r.is_empty()) {
        store.set(class.refresh_key(), refresh)?;
    }
    Ok(())
}

/// Remove both tokens of `class`. Returns how many slots were occupied.
pub fn clear_class(store: &dyn CredentialStore, class: IdentityClass) -> Result<usize, AuthError> {
    let mut removed = 0;
    for key in [class.access_key(), class.refresh_key()] {
        if store.remove(key)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Remove every token slot plus the last-login marker. Returns how many
/// token slots were occupied.
pub fn clear_all(store: &dyn CredentialStore) -> Result<usize, AuthError> {
    let mut removed = 0;
    for class in IdentityClass::ALL {
        removed += clear_class(store, class)?;
    }
    store.remove(LAST_LOGIN_KEY)?;
    Ok(removed)
}

/// Class recorded by the most recent login, if still known.
pub fn last_login(store: &dyn CredentialStore) -> Result<Option<IdentityClass>, AuthError> {
    Ok(store
        .get(LAST_LOGIN_KEY)?
        .and_then(|v| v.parse::<IdentityClass>().ok()))
}
