//! Message payload variants and text extraction.
//!
//! Live events and history-sync envelopes carry the same tagged payload, but the two
//! ingestion paths read it differently: the live path classifies media even though it
//! only stores text, while reconciliation treats anything that is not text as empty.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media classification stored alongside each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "document" => Ok(Self::Document),
            _ => Err(format!("Unknown content kind: {}", s)),
        }
    }
}

/// Payload of an inbound message.
///
/// Anything the bridge does not model (reactions, receipts, polls, ...) decodes as
/// `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain conversation text.
    Text { text: String },
    /// Text with link preview or a quoted reply.
    ExtendedText {
        text: String,
        #[serde(default)]
        quoted_id: Option<String>,
    },
    Image {
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        #[serde(default)]
        caption: Option<String>,
    },
    Audio {
        #[serde(default)]
        seconds: Option<u32>,
    },
    Document {
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        caption: Option<String>,
    },
    #[default]
    #[serde(other)]
    Unknown,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn text_body(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::ExtendedText { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Result of live-mode extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Message text; empty when there is nothing to store.
    pub text: String,
    pub kind: ContentKind,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Extract text and media kind from a live event payload.
///
/// Media variants produce an empty text (captions are not stored) but keep their kind.
pub fn extract_live(content: &MessageContent) -> Extracted {
    let kind = match content {
        MessageContent::Image { .. } => ContentKind::Image,
        MessageContent::Video { .. } => ContentKind::Video,
        MessageContent::Audio { .. } => ContentKind::Audio,
        MessageContent::Document { .. } => ContentKind::Document,
        _ => ContentKind::Text,
    };
    Extracted {
        text: content.text_body().unwrap_or_default().to_string(),
        kind,
    }
}

/// Extract text from a history-sync payload.
///
/// Returns `None` for every non-text variant and for empty text.
pub fn extract_history(content: &MessageContent) -> Option<String> {
    content
        .text_body()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
