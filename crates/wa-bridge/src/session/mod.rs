//! Protocol session abstraction.
//!
//! The bridge never speaks the messaging protocol itself. A session collaborator owns
//! the connection, pushes events to a registered handler, answers metadata lookups and
//! performs sends. `RemoteSession` is the production implementation, talking to a
//! session daemon over HTTP and WebSocket.

mod events;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::address::ChatAddress;

pub use events::{
    Conversation, HistoryEnvelope, HistorySync, MessageEvent, MessageKey, SessionEvent, SyncHint,
};
pub use remote::{RemoteSession, RemoteSessionConfig, SessionStatus};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors returned by a session collaborator.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not connected")]
    NotConnected,

    #[error("not logged in")]
    NotLoggedIn,

    /// The request never produced a usable response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The session answered but refused the operation.
    #[error("{0}")]
    Rejected(String),

    #[error("failed to parse session response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Acknowledgement of a sent message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Protocol message id, when the session reports one.
    pub message_id: Option<String>,
}

/// Receives session events.
///
/// Implementations must tolerate concurrent calls: each event may be handled on its
/// own task.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: SessionEvent);
}

/// The protocol session collaborator.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Whether the session currently has a live protocol connection.
    fn is_connected(&self) -> bool;

    /// The account's own address once logged in.
    fn own_address(&self) -> Option<ChatAddress>;

    /// Look up the subject of a group. `Ok(None)` means the directory has no record.
    async fn group_name(&self, group: &ChatAddress) -> SessionResult<Option<String>>;

    /// Look up the full name the contact directory holds for a direct chat.
    async fn contact_name(&self, contact: &ChatAddress) -> SessionResult<Option<String>>;

    async fn send_text(&self, recipient: &ChatAddress, text: &str) -> SessionResult<SendReceipt>;

    /// Ask the protocol to deliver up to `count` recent messages as a history sync.
    async fn request_history_sync(&self, count: u32) -> SessionResult<()>;

    /// Register the handler that receives every subsequent event.
    fn register_handler(&self, handler: Arc<dyn EventHandler>);
}
