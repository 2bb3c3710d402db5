#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use wcportal::ApiClient;
use wcportal::auth::{MemoryCredentialStore, SessionEvent};
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub store: MemoryCredentialStore,
    pub client: ApiClient,
    pub events: UnboundedReceiver<SessionEvent>,
}

impl Harness {
    /// Start a mock portal and a client whose store holds `entries`.
    pub async fn start(entries: &[(&str, &str)]) -> Self {
        let server = MockServer::start().await;
        let store = MemoryCredentialStore::with_entries(entries.iter().copied());
        let (client, events) = ApiClient::builder(&format!("{}/api/", server.uri()))
            .unwrap()
            .store(Arc::new(store.clone()))
            .build_with_events();
        Self {
            server,
            store,
            client,
            events,
        }
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn navigations(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::NavigateToLogin { .. }))
        .count()
}

pub fn notices(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Notice(_)))
        .count()
}
