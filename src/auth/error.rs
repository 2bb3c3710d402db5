//! Error types for auth module.

use super::IdentityClass;

/// Errors raised by credential storage and auth configuration.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Credential storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid identity priority list.
    #[error("Invalid identity priority: {0}")]
    InvalidPriority(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// Outcome of a failed refresh, delivered to the leader and to every queued
/// request. Cloneable so one failure can be fanned out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// No refresh token is available for the active identity (or no identity
    /// is active at all).
    #[error("No refresh token available{}", class_suffix(.class))]
    Unavailable { class: Option<IdentityClass> },

    /// The refresh endpoint answered with a non-success status.
    #[error("Refresh rejected for {class} ({status}): {message}")]
    Rejected {
        class: IdentityClass,
        status: u16,
        message: String,
    },

    /// The refresh endpoint answered 2xx but without a usable access token.
    #[error("Malformed refresh response for {class}: {message}")]
    Malformed { class: IdentityClass, message: String },

    /// The refresh call never produced a response.
    #[error("Refresh transport failure for {class}: {message}")]
    Transport {
        class: IdentityClass,
        message: String,
        timeout: bool,
    },

    /// Reading or writing the credential store failed during refresh.
    #[error("Storage error during refresh: {0}")]
    Storage(String),

    /// A queued request gave up waiting for the in-flight refresh.
    #[error("Timed out waiting for token refresh")]
    WaitTimedOut,

    /// The refresh task ended without settling its waiters.
    #[error("Token refresh was abandoned")]
    Abandoned,
}

fn class_suffix(class: &Option<IdentityClass>) -> String {
    match class {
        Some(c) => format!(" for {c}"),
        None => String::new(),
    }
}

impl From<AuthError> for RefreshError {
    fn from(err: AuthError) -> Self {
        RefreshError::Storage(err.to_string())
    }
}
