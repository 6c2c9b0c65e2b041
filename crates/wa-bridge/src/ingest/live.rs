//! Live message ingestion.

use tracing::{debug, warn};

use super::Ingestor;
use crate::address::ChatAddress;
use crate::content::extract_live;
use crate::resolver::NameRequest;
use crate::session::MessageEvent;
use crate::store::UpsertMessage;

/// What happened to a live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// The message row was written.
    Stored,
    /// Nothing to store: no text, or the chat address was unusable.
    Dropped,
    /// A storage write failed.
    Failed,
}

impl Ingestor {
    /// Store one live message.
    ///
    /// The chat row is refreshed even when the message itself carries no text.
    pub async fn ingest_live(&self, event: &MessageEvent) -> LiveOutcome {
        let chat = match event.chat.parse::<ChatAddress>() {
            Ok(chat) => chat,
            Err(e) => {
                warn!(id = %event.id, chat = %event.chat, error = %e, "Dropping message with invalid chat address");
                return LiveOutcome::Dropped;
            }
        };
        let chat_jid = chat.to_string();

        let extracted = extract_live(&event.content);

        let name = self
            .resolver()
            .resolve(NameRequest::new(&chat).with_sender(&event.sender))
            .await;

        if let Err(e) = self
            .store
            .upsert_chat(&chat_jid, &name, event.timestamp)
            .await
        {
            warn!(chat = %chat_jid, error = %e, "Failed to store chat");
            return LiveOutcome::Failed;
        }

        if extracted.is_empty() {
            debug!(id = %event.id, chat = %chat_jid, kind = %extracted.kind, "No text to store");
            return LiveOutcome::Dropped;
        }

        let message = UpsertMessage {
            id: event.id.clone(),
            chat_jid,
            sender: event.sender.clone(),
            content: extracted.text,
            timestamp: event.timestamp,
            is_from_me: event.from_me,
            media_type: extracted.kind,
        };

        match self.store.upsert_message(&message).await {
            Ok(true) => LiveOutcome::Stored,
            Ok(false) => LiveOutcome::Dropped,
            Err(e) => {
                warn!(id = %message.id, chat = %message.chat_jid, error = %e, "Failed to store message");
                LiveOutcome::Failed
            }
        }
    }
}
