//! Read filters for chats and messages.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Chat ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSort {
    /// Most recent activity first.
    #[default]
    LastActive,
    /// Display name, then address.
    Name,
}

/// Filter for [`MessageStore::search_chats`](super::MessageStore::search_chats).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatQuery {
    /// Substring of the chat name or address.
    pub query: Option<String>,
    pub sort_by: ChatSort,
    /// No limit returns every match and ignores `page`.
    pub limit: Option<u32>,
    /// Zero-based page of `limit` rows.
    pub page: u32,
}

/// Filter for [`MessageStore::search_messages`](super::MessageStore::search_messages).
///
/// Every field narrows the result; an empty filter matches all messages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageQuery {
    pub chat_jid: Option<String>,
    /// Full sender address or its phone number part.
    #[serde(alias = "sender_phone_number")]
    pub sender: Option<String>,
    /// Substring of the message text.
    pub query: Option<String>,
    /// Only messages strictly newer than this instant.
    pub after: Option<DateTime<Utc>>,
    /// Only messages strictly older than this instant.
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub page: u32,
}

impl MessageQuery {
    pub fn for_chat(chat_jid: impl Into<String>) -> Self {
        Self {
            chat_jid: Some(chat_jid.into()),
            ..Default::default()
        }
    }
}

/// `LIKE` pattern matching `text` anywhere, with wildcards in `text` escaped.
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Row offset for a zero-based page.
pub(crate) fn page_offset(limit: u32, page: u32) -> i64 {
    i64::from(limit) * i64::from(page)
}

/// Treat blank filter strings as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
