//! Single-flight token refresh.
//!
//! At most one refresh is in flight per client. The first authorization
//! failure captures the active credential record and spawns the refresh;
//! failures arriving while it runs enqueue a waiter and suspend. Settlement
//! drains the queue in enqueue order with the same outcome for everyone and
//! returns the state to idle.
//!
//! The refresh itself runs on a spawned task, so a caller dropping its
//! future never leaves the coordinator stuck in the refreshing state. A
//! supervising task settles the queue with `Abandoned` if that task panics.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::IdentityClass;
use super::credentials::{self, CredentialRecord};
use super::error::RefreshError;
use super::refresh::Refresher;
use super::resolver::AuthResolver;
use super::session::{InvalidationScope, LoginReason, SessionInvalidator};

/// A usable access token and the class it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub class: IdentityClass,
    pub token: String,
}

impl BearerToken {
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("class", &self.class)
            .field("token", &"<redacted>")
            .finish()
    }
}

type Waiter = oneshot::Sender<Result<BearerToken, RefreshError>>;

enum RefreshState {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

enum Entry {
    Current(BearerToken),
    Wait(oneshot::Receiver<Result<BearerToken, RefreshError>>),
    Fail(RefreshError),
}

/// Serializes refresh attempts into one in-flight operation.
pub struct RefreshCoordinator {
    resolver: AuthResolver,
    refresher: Arc<dyn Refresher>,
    invalidator: SessionInvalidator,
    state: Mutex<RefreshState>,
    wait_timeout: Option<Duration>,
    attempts: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        resolver: AuthResolver,
        refresher: Arc<dyn Refresher>,
        invalidator: SessionInvalidator,
    ) -> Self {
        Self {
            resolver,
            refresher,
            invalidator,
            state: Mutex::new(RefreshState::Idle),
            wait_timeout: None,
            attempts: AtomicU64::new(0),
        }
    }

    /// Bound how long a caller waits for the in-flight refresh. Unbounded by
    /// default; the refresh call's own deadline still applies.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Obtain a fresh access token after an authorization failure.
    ///
    /// `failed_token` is the token the failing request carried. When the
    /// store already holds a different token for the active class, a refresh
    /// completed after that request went out and the current token is
    /// returned without calling the refresh endpoint again.
    #[instrument(skip(self, failed_token))]
    pub async fn refresh(
        self: &Arc<Self>,
        failed_token: Option<&str>,
    ) -> Result<BearerToken, RefreshError> {
        let rx = match self.enter(failed_token)? {
            Entry::Current(token) => return Ok(token),
            Entry::Fail(err) => return Err(err),
            Entry::Wait(rx) => rx,
        };

        let outcome = match self.wait_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(?limit, "Gave up waiting for token refresh");
                    return Err(RefreshError::WaitTimedOut);
                }
            },
            None => rx.await,
        };
        outcome.unwrap_or(Err(RefreshError::Abandoned))
    }

    /// Decide, under the state lock, whether to join, start or skip a refresh.
    fn enter(self: &Arc<Self>, failed_token: Option<&str>) -> Result<Entry, RefreshError> {
        let mut state = self.state.lock();

        if let RefreshState::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push_back(tx);
            debug!(queued = waiters.len(), "Joined in-flight refresh");
            return Ok(Entry::Wait(rx));
        }

        let record = self.resolver.resolve_active()?;
        if let Some(failed) = failed_token {
            match &record {
                Some(current) if current.access_token != failed => {
                    debug!(class = %current.class, "Token already replaced; reusing it");
                    return Ok(Entry::Current(BearerToken {
                        class: current.class,
                        token: current.access_token.clone(),
                    }));
                }
                None => {
                    debug!("Session already torn down");
                    return Ok(Entry::Fail(RefreshError::Unavailable { class: None }));
                }
                _ => {}
            }
        }

        let (tx, rx) = oneshot::channel();
        *state = RefreshState::Refreshing {
            waiters: VecDeque::from([tx]),
        };
        drop(state);

        self.attempts.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let worker = Arc::clone(&this);
            let outcome = match tokio::spawn(async move { worker.run(record).await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "Token refresh task died");
                    Err(RefreshError::Abandoned)
                }
            };
            this.settle(outcome);
        });
        Ok(Entry::Wait(rx))
    }

    async fn run(&self, record: Option<CredentialRecord>) -> Result<BearerToken, RefreshError> {
        let outcome = self.exchange(record).await;
        if let Err(err) = &outcome {
            warn!(error = %err, "Token refresh failed; invalidating session");
            if let Err(e) = self
                .invalidator
                .invalidate(InvalidationScope::All, LoginReason::SessionExpired)
            {
                warn!(error = %e, "Failed to clear credentials after refresh failure");
            }
        }
        outcome
    }

    async fn exchange(&self, record: Option<CredentialRecord>) -> Result<BearerToken, RefreshError> {
        let Some(record) = record else {
            return Err(RefreshError::Unavailable { class: None });
        };
        let class = record.class;
        let Some(refresh_token) = record.refresh_token else {
            return Err(RefreshError::Unavailable { class: Some(class) });
        };

        let tokens = self.refresher.refresh(class, &refresh_token).await?;
        credentials::store_refreshed(
            self.resolver.store().as_ref(),
            class,
            &tokens.access,
            tokens.refresh.as_deref(),
        )?;
        info!(%class, rotated = tokens.refresh.is_some(), "Access token refreshed");
        Ok(BearerToken {
            class,
            token: tokens.access,
        })
    }

    fn settle(&self, outcome: Result<BearerToken, RefreshError>) {
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => VecDeque::new(),
            }
        };
        debug!(count = waiters.len(), ok = outcome.is_ok(), "Settling refresh waiters");
        for waiter in waiters {
            // A waiter that timed out has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers waiting on the in-flight refresh.
    pub fn queued(&self) -> usize {
        match &*self.state.lock() {
            RefreshState::Refreshing { waiters } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Number of refresh operations started since creation.
    pub fn refresh_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn resolver(&self) -> &AuthResolver {
        &self.resolver
    }

    pub fn invalidator(&self) -> &SessionInvalidator {
        &self.invalidator
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("wait_timeout", &self.wait_timeout)
            .field("attempts", &self.refresh_attempts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::refresh::RefreshedTokens;
    use crate::auth::session::SessionEvent;
    use crate::auth::store::{CredentialStore, MemoryCredentialStore};
    use crate::auth::resolver::IdentityPriority;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, mpsc};

    /// Refresher that blocks until released and counts its calls.
    struct GatedRefresher {
        calls: AtomicUsize,
        release: Notify,
        outcome: Result<RefreshedTokens, RefreshError>,
    }

    impl GatedRefresher {
        fn new(outcome: Result<RefreshedTokens, RefreshError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                outcome,
            })
        }
    }

    #[async_trait::async_trait]
    impl Refresher for GatedRefresher {
        async fn refresh(
            &self,
            _class: IdentityClass,
            _refresh_token: &str,
        ) -> Result<RefreshedTokens, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            self.outcome.clone()
        }
    }

    fn ok_tokens(access: &str) -> Result<RefreshedTokens, RefreshError> {
        Ok(RefreshedTokens {
            access: access.to_string(),
            refresh: None,
        })
    }

    fn setup(
        store: &MemoryCredentialStore,
        refresher: Arc<GatedRefresher>,
    ) -> (Arc<RefreshCoordinator>, mpsc::UnboundedReceiver<SessionEvent>) {
        let shared: Arc<dyn CredentialStore> = Arc::new(store.clone());
        let resolver = AuthResolver::new(shared.clone(), IdentityPriority::default());
        let (invalidator, rx) = SessionInvalidator::with_channel(shared);
        (
            Arc::new(RefreshCoordinator::new(resolver, refresher, invalidator)),
            rx,
        )
    }

    async fn wait_for_queue(coordinator: &RefreshCoordinator, len: usize) {
        while coordinator.queued() < len {
            tokio::task::yield_now().await;
        }
    }

    fn student_store() -> MemoryCredentialStore {
        MemoryCredentialStore::with_entries([
            ("studentAccessToken", "old"),
            ("studentRefreshToken", "r1"),
        ])
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_refresh() {
        let store = student_store();
        let refresher = GatedRefresher::new(ok_tokens("new"));
        let (coordinator, mut events) = setup(&store, refresher.clone());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let c = coordinator.clone();
            handles.push(tokio::spawn(async move { c.refresh(Some("old")).await }));
        }
        wait_for_queue(&coordinator, 5).await;
        assert!(coordinator.is_refreshing());
        refresher.release.notify_one();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.token, "new");
            assert_eq!(token.class, IdentityClass::Student);
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.refresh_attempts(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.queued(), 0);
        assert_eq!(
            store.get("studentAccessToken").unwrap().as_deref(),
            Some("new")
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_waiters_settle_in_enqueue_order() {
        let store = student_store();
        let refresher = GatedRefresher::new(ok_tokens("new"));
        let (coordinator, _events) = setup(&store, refresher.clone());
        let (order_tx, mut order_rx) = mpsc::unbounded_channel();

        for id in 0..4 {
            let c = coordinator.clone();
            let order_tx = order_tx.clone();
            tokio::spawn(async move {
                let result = c.refresh(Some("old")).await;
                order_tx.send((id, result.is_ok())).unwrap();
            });
            wait_for_queue(&coordinator, id + 1).await;
        }
        drop(order_tx);
        refresher.release.notify_one();

        let mut seen = Vec::new();
        while let Some((id, ok)) = order_rx.recv().await {
            assert!(ok);
            seen.push(id);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failure_fans_out_and_navigates_once() {
        let store = student_store();
        let rejected = RefreshError::Rejected {
            class: IdentityClass::Student,
            status: 401,
            message: "token_not_valid".into(),
        };
        let refresher = GatedRefresher::new(Err(rejected.clone()));
        let (coordinator, mut events) = setup(&store, refresher.clone());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let c = coordinator.clone();
            handles.push(tokio::spawn(async move { c.refresh(Some("old")).await }));
        }
        wait_for_queue(&coordinator, 3).await;
        refresher.release.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), rejected);
        }
        assert!(store.is_empty());

        let mut navigations = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::NavigateToLogin { .. }) {
                navigations += 1;
            }
        }
        assert_eq!(navigations, 1);
        assert!(!coordinator.is_refreshing());

        // A late failure with the dead token finds the session already gone.
        let late = coordinator.refresh(Some("old")).await.unwrap_err();
        assert_eq!(late, RefreshError::Unavailable { class: None });
        assert!(events.try_recv().is_err());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_skips_endpoint() {
        let store = MemoryCredentialStore::with_entries([("teacherAccessToken", "t")]);
        let refresher = GatedRefresher::new(ok_tokens("unused"));
        let (coordinator, mut events) = setup(&store, refresher.clone());

        let err = coordinator.refresh(Some("t")).await.unwrap_err();
        assert_eq!(
            err,
            RefreshError::Unavailable {
                class: Some(IdentityClass::Teacher)
            }
        );
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
        assert!(matches!(events.try_recv(), Ok(SessionEvent::Notice(_))));
        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::NavigateToLogin {
                reason: LoginReason::SessionExpired
            })
        ));
    }

    #[tokio::test]
    async fn test_stale_failure_reuses_current_token() {
        let store = MemoryCredentialStore::with_entries([
            ("accessToken", "fresh"),
            ("refreshToken", "r"),
        ]);
        let refresher = GatedRefresher::new(ok_tokens("unused"));
        let (coordinator, _events) = setup(&store, refresher.clone());

        let token = coordinator.refresh(Some("expired")).await.unwrap();
        assert_eq!(token.token, "fresh");
        assert_eq!(token.class, IdentityClass::Admin);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_stored() {
        let store = student_store();
        let refresher = GatedRefresher::new(Ok(RefreshedTokens {
            access: "new".into(),
            refresh: Some("r2".into()),
        }));
        let (coordinator, _events) = setup(&store, refresher.clone());
        refresher.release.notify_one();

        coordinator.refresh(Some("old")).await.unwrap();
        assert_eq!(
            store.get("studentRefreshToken").unwrap().as_deref(),
            Some("r2")
        );
    }

    struct PanickingRefresher;

    #[async_trait::async_trait]
    impl Refresher for PanickingRefresher {
        async fn refresh(
            &self,
            _class: IdentityClass,
            _refresh_token: &str,
        ) -> Result<RefreshedTokens, RefreshError> {
            panic!("refresher exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_refresh_settles_waiters() {
        let store = student_store();
        let shared: Arc<dyn CredentialStore> = Arc::new(store.clone());
        let resolver = AuthResolver::new(shared.clone(), IdentityPriority::default());
        let (invalidator, mut events) = SessionInvalidator::with_channel(shared);
        let coordinator = Arc::new(RefreshCoordinator::new(
            resolver,
            Arc::new(PanickingRefresher),
            invalidator,
        ));

        let (a, b) = tokio::join!(
            coordinator.refresh(Some("old")),
            coordinator.refresh(Some("old")),
        );
        assert_eq!(a.unwrap_err(), RefreshError::Abandoned);
        assert_eq!(b.unwrap_err(), RefreshError::Abandoned);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.queued(), 0);

        // The coordinator is usable again and the next failure starts a new attempt.
        let again = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.refresh(Some("old")),
        )
        .await
        .unwrap();
        assert_eq!(again.unwrap_err(), RefreshError::Abandoned);
        assert_eq!(coordinator.refresh_attempts(), 2);

        assert_eq!(store.len(), 2);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_releases_caller_only() {
        let store = student_store();
        let refresher = GatedRefresher::new(ok_tokens("new"));
        let shared: Arc<dyn CredentialStore> = Arc::new(store.clone());
        let resolver = AuthResolver::new(shared.clone(), IdentityPriority::default());
        let coordinator = Arc::new(
            RefreshCoordinator::new(resolver, refresher.clone(), SessionInvalidator::new(shared))
                .with_wait_timeout(Some(Duration::from_secs(5))),
        );

        let err = coordinator.refresh(Some("old")).await.unwrap_err();
        assert_eq!(err, RefreshError::WaitTimedOut);
        assert!(coordinator.is_refreshing());

        refresher.release.notify_one();
        while coordinator.is_refreshing() {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            store.get("studentAccessToken").unwrap().as_deref(),
            Some("new")
        );
    }
}
