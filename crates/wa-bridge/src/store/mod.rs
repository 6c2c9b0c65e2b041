//! Durable chat and message storage.
//!
//! The database holds two tables:
//! - `chats`: one row per conversation address with its display name and last activity
//! - `messages`: one row per `(id, chat_jid)`, only for messages that carry text
//!
//! `MessageStore` is the sole writer. Both ingestion paths and the name resolver go
//! through it.

mod db;
mod error;
mod models;
mod query;
mod repository;

pub use db::{DEFAULT_DB_FILE, MessageDb};
pub use error::{StorageError, StorageResult};
pub use models::{
    Chat, StoredMessage, TIMESTAMP_FORMAT, UNKNOWN_SENDER, UpsertMessage, format_timestamp,
    parse_timestamp,
};
pub use query::{ChatQuery, ChatSort, MessageQuery};
pub use repository::MessageStore;
