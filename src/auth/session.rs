//! Session invalidation and user-facing session events.
//!
//! Invalidation is the only path that tears credentials down after login.
//! Every teardown that actually removed something produces exactly one
//! [`SessionEvent::Notice`] followed by one [`SessionEvent::NavigateToLogin`];
//! a teardown that finds the slots already empty stays silent, so concurrent
//! failures collapse into a single redirect.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::IdentityClass;
use super::credentials::{self, CredentialRecord};
use super::error::AuthError;
use super::store::CredentialStore;

/// Which credentials an invalidation removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Only the given class's token pair.
    Class(IdentityClass),
    /// Every class plus the last-login marker.
    All,
}

/// Why the user is being sent to the login entry point. Serialized as the
/// reason code the login page understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoginReason {
    Unauthorized,
    SessionExpired,
}

impl LoginReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::SessionExpired => "session-expired",
        }
    }
}

/// Category of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SessionExpired,
    PermissionDenied,
    NotFound,
    ServerError,
}

impl NoticeKind {
    pub fn message(&self) -> &'static str {
        match self {
            Self::SessionExpired => "Login expired, please log in again",
            Self::PermissionDenied => "You do not have permission to access this resource",
            Self::NotFound => "The requested resource does not exist",
            Self::ServerError => "Server error, please try again later",
        }
    }
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl From<NoticeKind> for Notice {
    fn from(kind: NoticeKind) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
        }
    }
}

/// Events emitted towards whatever presents the session to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Notice(Notice),
    NavigateToLogin { reason: LoginReason },
}

/// Clears credentials and emits the matching notice and navigation events.
#[derive(Clone)]
pub struct SessionInvalidator {
    store: Arc<dyn CredentialStore>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    gate: Arc<Mutex<()>>,
}

impl SessionInvalidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            events: None,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Create an invalidator together with the receiving end of its event
    /// channel.
    pub fn with_channel(
        store: Arc<dyn CredentialStore>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut invalidator = Self::new(store);
        invalidator.events = Some(tx);
        (invalidator, rx)
    }

    /// Remove credentials in `scope`. Emits a notice and a login navigation
    /// only when at least one token slot was occupied. Returns the number of
    /// slots removed.
    pub fn invalidate(
        &self,
        scope: InvalidationScope,
        reason: LoginReason,
    ) -> Result<usize, AuthError> {
        let _guard = self.gate.lock();
        let removed = match scope {
            InvalidationScope::Class(class) => credentials::clear_class(self.store.as_ref(), class)?,
            InvalidationScope::All => credentials::clear_all(self.store.as_ref())?,
        };

        if removed == 0 {
            debug!(?scope, "Session already torn down; skipping navigation");
            return Ok(0);
        }

        info!(?scope, reason = reason.as_str(), removed, "Session invalidated");
        let notice = match reason {
            LoginReason::SessionExpired => NoticeKind::SessionExpired,
            LoginReason::Unauthorized => NoticeKind::PermissionDenied,
        };
        self.emit(SessionEvent::Notice(notice.into()));
        self.emit(SessionEvent::NavigateToLogin { reason });
        Ok(removed)
    }

    /// Emit a non-fatal notice without touching credentials.
    pub fn notify(&self, kind: NoticeKind) {
        self.emit(SessionEvent::Notice(kind.into()));
    }

    /// Route guard: the stored record for `class`, or a login navigation
    /// with reason `Unauthorized` when none exists.
    pub fn require(&self, class: IdentityClass) -> Result<Option<CredentialRecord>, AuthError> {
        let record = credentials::read_record(self.store.as_ref(), class)?;
        if record.is_none() {
            debug!(%class, "Guarded entry without credentials");
            self.emit(SessionEvent::NavigateToLogin {
                reason: LoginReason::Unauthorized,
            });
        }
        Ok(record)
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                warn!("Session event receiver dropped");
            }
        }
    }
}

impl std::fmt::Debug for SessionInvalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInvalidator")
            .field("store", &self.store.name())
            .field("has_listener", &self.events.is_some())
            .finish()
    }
}
