//! History sync reconciliation.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::Ingestor;
use crate::address::ChatAddress;
use crate::content::{ContentKind, extract_history};
use crate::resolver::NameRequest;
use crate::session::{Conversation, HistoryEnvelope, HistorySync};
use crate::store::UpsertMessage;

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub conversations_seen: usize,
    pub conversations_stored: usize,
    pub conversations_skipped: usize,
    pub messages_stored: usize,
    pub messages_skipped: usize,
    pub messages_failed: usize,
}

impl Ingestor {
    /// Apply a history sync batch.
    ///
    /// Replaying the same batch leaves the store unchanged.
    pub async fn reconcile(&self, sync: &HistorySync) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for conversation in &sync.conversations {
            report.conversations_seen += 1;
            if self.reconcile_conversation(conversation, &mut report).await {
                report.conversations_stored += 1;
            } else {
                report.conversations_skipped += 1;
            }
        }

        info!(
            conversations = report.conversations_seen,
            stored = report.conversations_stored,
            skipped = report.conversations_skipped,
            messages = report.messages_stored,
            "History sync applied"
        );
        report
    }

    /// Returns whether the chat row was written.
    async fn reconcile_conversation(
        &self,
        conversation: &Conversation,
        report: &mut ReconcileReport,
    ) -> bool {
        let Some(chat) = conversation
            .id
            .as_deref()
            .and_then(|id| id.parse::<ChatAddress>().ok())
        else {
            debug!(id = ?conversation.id, "Skipping conversation without a usable address");
            return false;
        };
        let chat_jid = chat.to_string();

        let Some(latest) = conversation.messages.first() else {
            debug!(chat = %chat_jid, "Skipping conversation without messages");
            return false;
        };

        let name = self
            .resolver()
            .resolve(NameRequest::new(&chat).with_hint(&conversation.hint))
            .await;

        let Some(last_activity) = latest.timestamp() else {
            debug!(chat = %chat_jid, "Skipping conversation whose latest message has no timestamp");
            return false;
        };

        if let Err(e) = self
            .store
            .upsert_chat(&chat_jid, &name, last_activity)
            .await
        {
            warn!(chat = %chat_jid, error = %e, "Failed to store synced chat");
            return false;
        }

        for envelope in &conversation.messages {
            let Some(message) = self.envelope_to_message(&chat, envelope) else {
                report.messages_skipped += 1;
                continue;
            };
            match self.store.upsert_message(&message).await {
                Ok(true) => report.messages_stored += 1,
                Ok(false) => report.messages_skipped += 1,
                Err(e) => {
                    warn!(id = %message.id, chat = %chat_jid, error = %e, "Failed to store synced message");
                    report.messages_failed += 1;
                }
            }
        }

        true
    }

    fn envelope_to_message(
        &self,
        chat: &ChatAddress,
        envelope: &HistoryEnvelope,
    ) -> Option<UpsertMessage> {
        let id = envelope.message_id()?;
        let timestamp = envelope.timestamp()?;
        let content = extract_history(envelope.message.as_ref()?)?;
        let from_me = envelope.key.as_ref().is_some_and(|key| key.from_me);

        Some(UpsertMessage {
            id: id.to_string(),
            chat_jid: chat.to_string(),
            sender: self.envelope_sender(chat, envelope, from_me),
            content,
            timestamp,
            is_from_me: from_me,
            media_type: ContentKind::Text,
        })
    }

    fn envelope_sender(
        &self,
        chat: &ChatAddress,
        envelope: &HistoryEnvelope,
        from_me: bool,
    ) -> String {
        if from_me {
            return self
                .session
                .own_address()
                .unwrap_or_else(|| chat.clone())
                .to_string();
        }

        envelope
            .key
            .as_ref()
            .and_then(|key| key.participant.as_deref())
            .filter(|participant| !participant.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| chat.to_string())
    }
}
