//! Events delivered by the protocol session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::MessageContent;

/// A notification from the protocol session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A live inbound or outbound (self-sent echo) message.
    Message(MessageEvent),
    Connected,
    Disconnected,
    LoggedOut,
    /// Bulk history dump, usually sent right after pairing or on request.
    HistorySync(HistorySync),
}

/// A single live message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: String,
    /// Address of the conversation the message belongs to.
    pub chat: String,
    /// Address of the author; may be empty on some system messages.
    #[serde(default)]
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub content: MessageContent,
}

/// Bulk history payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistorySync {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// One conversation in a history sync.
///
/// Every field is optional on the wire; the reconciliation path decides what to skip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub hint: SyncHint,
    /// Envelopes, most recent first.
    #[serde(default)]
    pub messages: Vec<HistoryEnvelope>,
}

/// Naming metadata attached to a synced conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncHint {
    /// Group conversation metadata.
    Group {
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    /// Contact record for a direct conversation.
    Contact {
        #[serde(default)]
        full_name: Option<String>,
    },
    #[default]
    None,
}

/// A historical message as carried in a sync batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryEnvelope {
    #[serde(default)]
    pub key: Option<MessageKey>,
    /// Unix seconds; zero or absent when the protocol did not provide one.
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub message: Option<MessageContent>,
}

impl HistoryEnvelope {
    /// The envelope timestamp, if present and representable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.timestamp?).ok()?;
        if secs == 0 {
            return None;
        }
        DateTime::from_timestamp(secs, 0)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.key
            .as_ref()
            .and_then(|key| key.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Identity of a historical message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageKey {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    /// Author inside a group conversation.
    #[serde(default)]
    pub participant: Option<String>,
}
