use crate::auth::{AuthError, IdentityClass, RefreshError};

/// Unified error type surfaced by the API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure. Never retried by the client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The token refresh triggered by a 401 failed; the session has been
    /// reset by the time this is returned.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// 401 that could not be recovered by a refresh.
    #[error("Authentication required ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status returned to a typed helper.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A guarded operation was attempted without credentials for `class`.
    #[error("Not logged in as {0}")]
    NotAuthenticated(IdentityClass),

    #[error("Credential storage error: {0}")]
    Storage(#[from] AuthError),

    /// A success response whose body did not match the expected shape.
    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. }
            | Self::Server { status, .. }
            | Self::Api { status, .. } => Some(*status),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the error means the user has to log in again.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::Refresh(RefreshError::WaitTimedOut | RefreshError::Abandoned) => false,
            Self::Refresh(_) => true,
            Self::NotAuthenticated(_) => true,
            _ => false,
        }
    }

    pub fn error_type(&self) -> &str {
        match self {
            Self::Network(_) => "network_error",
            Self::Refresh(_) | Self::Unauthorized { .. } | Self::NotAuthenticated(_) => {
                "authentication_error"
            }
            Self::PermissionDenied(_) => "permission_error",
            Self::NotFound(_) => "not_found_error",
            Self::Server { .. } => "server_error",
            Self::Api { .. } | Self::InvalidRequest(_) => "invalid_request_error",
            Self::Decode(_) => "api_error",
            Self::Storage(_) | Self::Io(_) => "storage_error",
            Self::Config(_) => "config_error",
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The server reports errors as `{"detail": ...}`, `{"error": ...}`,
/// `{"message": ...}` or as a map of field errors; anything else is
/// returned verbatim.
pub fn extract_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    for key in ["detail", "error", "message", "msg"] {
        if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    if let Some(fields) = value.as_object() {
        let parts: Vec<String> = fields
            .iter()
            .filter_map(|(field, v)| {
                let text = match v {
                    serde_json::Value::Array(items) => items.first()?.as_str()?.to_string(),
                    serde_json::Value::String(s) => s.clone(),
                    _ => return None,
                };
                Some(format!("{field}: {text}"))
            })
            .collect();
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }
    body.trim().to_string()
}
