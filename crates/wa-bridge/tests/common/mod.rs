//! Test utilities and common setup.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use wa_bridge::address::ChatAddress;
use wa_bridge::api::{self, AppState};
use wa_bridge::gateway::OutboundGateway;
use wa_bridge::ingest::Ingestor;
use wa_bridge::session::{
    EventHandler, SendReceipt, SessionClient, SessionError, SessionEvent, SessionResult,
};
use wa_bridge::store::{MessageDb, MessageStore};

/// In-process session: records sends, answers directory lookups from fixed tables and
/// forwards injected events to the registered handler.
#[derive(Default)]
pub struct MockSession {
    connected: AtomicBool,
    own: Mutex<Option<ChatAddress>>,
    groups: Mutex<HashMap<String, String>>,
    contacts: Mutex<HashMap<String, String>>,
    send_failure: Mutex<Option<String>>,
    sent: Mutex<Vec<(String, String)>>,
    history_requests: Mutex<Vec<u32>>,
    handler: Mutex<Option<Arc<dyn EventHandler>>>,
}

impl MockSession {
    pub fn connected() -> Arc<Self> {
        let session = Self::default();
        session.set_connected(true);
        Arc::new(session)
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_own_address(&self, jid: &str) {
        *self.own.lock().unwrap() = Some(jid.parse().unwrap());
    }

    pub fn add_group(&self, jid: &str, name: &str) {
        self.groups
            .lock()
            .unwrap()
            .insert(jid.to_string(), name.to_string());
    }

    pub fn add_contact(&self, jid: &str, full_name: &str) {
        self.contacts
            .lock()
            .unwrap()
            .insert(jid.to_string(), full_name.to_string());
    }

    pub fn fail_sends_with(&self, reason: &str) {
        *self.send_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn history_requests(&self) -> Vec<u32> {
        self.history_requests.lock().unwrap().clone()
    }

    /// Deliver an event to the registered handler and wait for it to finish.
    pub async fn emit(&self, event: SessionEvent) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.handle_event(event).await;
        }
    }
}

#[async_trait]
impl SessionClient for MockSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn own_address(&self) -> Option<ChatAddress> {
        self.own.lock().unwrap().clone()
    }

    async fn group_name(&self, group: &ChatAddress) -> SessionResult<Option<String>> {
        Ok(self.groups.lock().unwrap().get(&group.to_string()).cloned())
    }

    async fn contact_name(&self, contact: &ChatAddress) -> SessionResult<Option<String>> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .get(&contact.to_string())
            .cloned())
    }

    async fn send_text(&self, recipient: &ChatAddress, text: &str) -> SessionResult<SendReceipt> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        if let Some(reason) = self.send_failure.lock().unwrap().clone() {
            return Err(SessionError::Transport(reason));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(SendReceipt {
            message_id: Some(format!("sent-{}", self.sent.lock().unwrap().len())),
        })
    }

    async fn request_history_sync(&self, count: u32) -> SessionResult<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.history_requests.lock().unwrap().push(count);
        Ok(())
    }

    fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }
}

/// Everything a test needs to drive the bridge end to end.
pub struct TestBridge {
    pub app: Router,
    pub store: MessageStore,
    pub session: Arc<MockSession>,
}

/// Build the bridge over an in-memory database with the ingestor registered.
pub async fn test_bridge(session: Arc<MockSession>) -> TestBridge {
    let db = MessageDb::in_memory().await.unwrap();
    let store = MessageStore::new(db);

    let session_client: Arc<dyn SessionClient> = session.clone();
    session.register_handler(Arc::new(Ingestor::new(
        store.clone(),
        session_client.clone(),
    )));

    let state = AppState::new(store.clone(), OutboundGateway::new(session_client));
    TestBridge {
        app: api::create_router(state),
        store,
        session,
    }
}

/// Create a test application with a connected session.
pub async fn test_app() -> Router {
    test_bridge(MockSession::connected()).await.app
}
