//! Stored chat and message models.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::content::ContentKind;

/// Timestamp layout used for every stored time column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sender recorded when the source omits one.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Format a timestamp for storage.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp, falling back to the epoch when it is malformed.
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// A chat as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chat {
    pub jid: String,
    /// Display name; empty until resolved.
    pub name: String,
    pub last_message_time: DateTime<Utc>,
}

/// A stored message as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    pub id: String,
    pub chat_jid: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
    pub media_type: ContentKind,
}

/// Input for a message upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertMessage {
    pub id: String,
    pub chat_jid: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
    pub media_type: ContentKind,
}

#[derive(Debug, FromRow)]
pub(crate) struct ChatRow {
    pub jid: String,
    pub name: Option<String>,
    pub last_message_time: Option<String>,
}

impl From<ChatRow> for Chat {
    fn from(row: ChatRow) -> Self {
        Self {
            last_message_time: parse_timestamp(row.last_message_time.as_deref()),
            jid: row.jid,
            name: row.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MessageRow {
    pub id: String,
    pub chat_jid: String,
    pub sender: String,
    pub content: String,
    pub timestamp: Option<String>,
    pub is_from_me: bool,
    pub media_type: Option<String>,
}

impl From<MessageRow> for StoredMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            timestamp: parse_timestamp(row.timestamp.as_deref()),
            media_type: row
                .media_type
                .and_then(|kind| kind.parse().ok())
                .unwrap_or_default(),
            id: row.id,
            chat_jid: row.chat_jid,
            sender: row.sender,
            content: row.content,
            is_from_me: row.is_from_me,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(format_timestamp(&ts), "2025-03-14 09:26:53");
        assert_eq!(parse_timestamp(Some("2025-03-14 09:26:53")), ts);
    }

    #[test]
    fn test_bad_timestamp_is_epoch() {
        assert_eq!(parse_timestamp(Some("yesterday")), DateTime::UNIX_EPOCH);
        assert_eq!(parse_timestamp(Some("")), DateTime::UNIX_EPOCH);
        assert_eq!(parse_timestamp(None), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_message_row_unknown_media_type() {
        let row = MessageRow {
            id: "m1".to_string(),
            chat_jid: "1@g.us".to_string(),
            sender: "2@s.whatsapp.net".to_string(),
            content: "hi".to_string(),
            timestamp: Some("2025-01-01 00:00:00".to_string()),
            is_from_me: false,
            media_type: Some("sticker".to_string()),
        };
        let msg = StoredMessage::from(row);
        assert_eq!(msg.media_type, ContentKind::Text);
    }
}
