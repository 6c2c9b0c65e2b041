//! Outbound message gateway.
//!
//! Sends go straight to the session. Nothing is written to the store here: a sent
//! message appears in the database once the session echoes it back as a live event.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::address::{AddressError, ChatAddress};
use crate::session::{SessionClient, SessionError};

/// Default number of messages requested per history sync.
pub const DEFAULT_HISTORY_SYNC_COUNT: u32 = 100;

/// Reasons an outbound operation failed.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Not connected to WhatsApp")]
    NotConnected,

    #[error("Error parsing recipient: {0}")]
    InvalidRecipient(#[from] AddressError),

    #[error("Error sending message: {0}")]
    Transport(SessionError),
}

impl From<SessionError> for SendError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotConnected | SessionError::NotLoggedIn => Self::NotConnected,
            other => Self::Transport(other),
        }
    }
}

/// The `{success, message}` result reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
}

impl From<&Result<String, SendError>> for SendOutcome {
    fn from(result: &Result<String, SendError>) -> Self {
        match result {
            Ok(message) => Self {
                success: true,
                message: message.clone(),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }
}

/// Sends text messages and history sync requests through the session.
#[derive(Clone)]
pub struct OutboundGateway {
    session: Arc<dyn SessionClient>,
}

impl OutboundGateway {
    pub fn new(session: Arc<dyn SessionClient>) -> Self {
        Self { session }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Send `text` to `recipient`, returning the confirmation text.
    ///
    /// Bare phone numbers are addressed as direct chats.
    pub async fn send(&self, recipient: &str, text: &str) -> Result<String, SendError> {
        if !self.session.is_connected() {
            return Err(SendError::NotConnected);
        }

        let address = ChatAddress::normalize_recipient(recipient)?;

        match self.session.send_text(&address, text).await {
            Ok(receipt) => {
                info!(recipient = %address, id = ?receipt.message_id, "Message sent");
                Ok(format!("Message sent to {}", recipient))
            }
            Err(e) => {
                warn!(recipient = %address, error = %e, "Send failed");
                Err(e.into())
            }
        }
    }

    /// Ask the session for up to `count` recent messages per chat.
    pub async fn request_history_sync(&self, count: u32) -> Result<String, SendError> {
        if !self.session.is_connected() {
            return Err(SendError::NotConnected);
        }

        self.session.request_history_sync(count).await?;
        info!(count, "History sync requested");
        Ok(format!("History sync requested for up to {} messages", count))
    }
}
