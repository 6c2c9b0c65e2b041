//! Application state shared across handlers.

use crate::gateway::{DEFAULT_HISTORY_SYNC_COUNT, OutboundGateway};
use crate::store::MessageStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read access to stored chats and messages.
    pub store: MessageStore,
    pub gateway: OutboundGateway,
    /// Messages requested when a history sync call names no count.
    pub history_sync_count: u32,
}

impl AppState {
    pub fn new(store: MessageStore, gateway: OutboundGateway) -> Self {
        Self {
            store,
            gateway,
            history_sync_count: DEFAULT_HISTORY_SYNC_COUNT,
        }
    }

    pub fn with_history_sync_count(mut self, count: u32) -> Self {
        self.history_sync_count = count;
        self
    }
}
