//! Ingestion engine.
//!
//! `Ingestor` is registered with the session as its event handler. Live messages and
//! history syncs both land in the same store through idempotent upserts, so the two
//! paths may run concurrently and in any order.

mod history;
mod live;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::resolver::ChatNameResolver;
use crate::session::{EventHandler, SessionClient, SessionEvent};
use crate::store::MessageStore;

pub use history::ReconcileReport;
pub use live::LiveOutcome;

/// Writes session events into the message store.
#[derive(Clone)]
pub struct Ingestor {
    store: MessageStore,
    session: Arc<dyn SessionClient>,
}

impl Ingestor {
    pub fn new(store: MessageStore, session: Arc<dyn SessionClient>) -> Self {
        Self { store, session }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    fn resolver(&self) -> ChatNameResolver<'_> {
        ChatNameResolver::new(&self.store, self.session.as_ref())
    }
}

#[async_trait]
impl EventHandler for Ingestor {
    async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Message(message) => {
                self.ingest_live(&message).await;
            }
            SessionEvent::HistorySync(sync) => {
                self.reconcile(&sync).await;
            }
            SessionEvent::Connected => info!("Connected to WhatsApp"),
            SessionEvent::Disconnected => warn!("Disconnected from WhatsApp"),
            SessionEvent::LoggedOut => warn!("Logged out from WhatsApp, pairing required"),
        }
    }
}
