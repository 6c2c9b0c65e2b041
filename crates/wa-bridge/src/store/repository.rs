//! Chat and message persistence.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use super::db::MessageDb;
use super::error::{StorageResult, db_err};
use super::models::{
    Chat, ChatRow, MessageRow, StoredMessage, UNKNOWN_SENDER, UpsertMessage, format_timestamp,
};
use super::query::{ChatQuery, ChatSort, MessageQuery, contains_pattern, non_blank, page_offset};

/// The only write path to the message database.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct MessageStore {
    db: MessageDb,
}

impl MessageStore {
    pub fn new(db: MessageDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &MessageDb {
        &self.db
    }

    // ========== Chat Operations ==========

    /// Insert a chat or replace every column of the existing row.
    pub async fn upsert_chat(
        &self,
        jid: &str,
        name: &str,
        last_message_time: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (jid, name, last_message_time)
            VALUES (?, ?, ?)
            ON CONFLICT(jid) DO UPDATE SET
                name = excluded.name,
                last_message_time = excluded.last_message_time
            "#,
        )
        .bind(jid)
        .bind(name)
        .bind(format_timestamp(&last_message_time))
        .execute(self.db.pool())
        .await
        .map_err(db_err("upserting chat"))?;

        Ok(())
    }

    /// Stored display name for a chat, if one has been recorded.
    pub async fn chat_name(&self, jid: &str) -> StorageResult<Option<String>> {
        let name = sqlx::query_scalar::<_, Option<String>>("SELECT name FROM chats WHERE jid = ?")
            .bind(jid)
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err("fetching chat name"))?;

        Ok(name.flatten().filter(|name| !name.is_empty()))
    }

    pub async fn get_chat(&self, jid: &str) -> StorageResult<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT jid, name, last_message_time FROM chats WHERE jid = ?",
        )
        .bind(jid)
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err("fetching chat"))?;

        Ok(row.map(Chat::from))
    }

    /// All chats, most recently active first.
    pub async fn list_chats(&self) -> StorageResult<Vec<Chat>> {
        let rows = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT jid, name, last_message_time
            FROM chats
            ORDER BY last_message_time DESC, jid ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(db_err("listing chats"))?;

        Ok(rows.into_iter().map(Chat::from).collect())
    }

    /// Chats matching a name or address substring, sorted and paged.
    pub async fn search_chats(&self, filter: &ChatQuery) -> StorageResult<Vec<Chat>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT jid, name, last_message_time FROM chats");

        if let Some(text) = non_blank(&filter.query) {
            let pattern = contains_pattern(text);
            qb.push(" WHERE (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR jid LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        qb.push(match filter.sort_by {
            ChatSort::LastActive => " ORDER BY last_message_time DESC, jid ASC",
            ChatSort::Name => " ORDER BY name COLLATE NOCASE ASC, jid ASC",
        });

        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::from(limit))
                .push(" OFFSET ")
                .push_bind(page_offset(limit, filter.page));
        }

        let rows = qb
            .build_query_as::<ChatRow>()
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err("searching chats"))?;

        Ok(rows.into_iter().map(Chat::from).collect())
    }

    // ========== Message Operations ==========

    /// Insert a message or replace the row with the same `(id, chat_jid)`.
    ///
    /// Messages without text are not stored; the call succeeds without writing.
    /// Returns whether a row was written.
    pub async fn upsert_message(&self, message: &UpsertMessage) -> StorageResult<bool> {
        if message.content.is_empty() {
            return Ok(false);
        }

        let sender = if message.sender.is_empty() {
            UNKNOWN_SENDER
        } else {
            message.sender.as_str()
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_jid, sender, content, timestamp, is_from_me, media_type)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id, chat_jid) DO UPDATE SET
                sender = excluded.sender,
                content = excluded.content,
                timestamp = excluded.timestamp,
                is_from_me = excluded.is_from_me,
                media_type = excluded.media_type
            "#,
        )
        .bind(&message.id)
        .bind(&message.chat_jid)
        .bind(sender)
        .bind(&message.content)
        .bind(format_timestamp(&message.timestamp))
        .bind(message.is_from_me)
        .bind(message.media_type.to_string())
        .execute(self.db.pool())
        .await
        .map_err(db_err("upserting message"))?;

        debug!(
            id = %message.id,
            chat = %message.chat_jid,
            sender,
            "stored message"
        );
        Ok(true)
    }

    /// Messages of one chat, newest first.
    pub async fn list_messages(
        &self,
        chat_jid: &str,
        limit: u32,
    ) -> StorageResult<Vec<StoredMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type
            FROM messages
            WHERE chat_jid = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(chat_jid)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await
        .map_err(db_err("listing messages"))?;

        Ok(rows.into_iter().map(StoredMessage::from).collect())
    }

    /// Messages matching every set filter, newest first.
    ///
    /// A sender filter matches the full address or its phone number part.
    pub async fn search_messages(
        &self,
        filter: &MessageQuery,
    ) -> StorageResult<Vec<StoredMessage>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type \
             FROM messages WHERE 1 = 1",
        );

        if let Some(chat_jid) = non_blank(&filter.chat_jid) {
            qb.push(" AND chat_jid = ").push_bind(chat_jid.to_string());
        }
        if let Some(sender) = non_blank(&filter.sender) {
            qb.push(" AND (sender = ")
                .push_bind(sender.to_string())
                .push(" OR sender LIKE ")
                .push_bind(format!("{}@%", sender))
                .push(")");
        }
        if let Some(text) = non_blank(&filter.query) {
            qb.push(" AND content LIKE ")
                .push_bind(contains_pattern(text))
                .push(" ESCAPE '\\'");
        }
        if let Some(after) = filter.after {
            qb.push(" AND timestamp > ").push_bind(format_timestamp(&after));
        }
        if let Some(before) = filter.before {
            qb.push(" AND timestamp < ").push_bind(format_timestamp(&before));
        }

        qb.push(" ORDER BY timestamp DESC, id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::from(limit))
                .push(" OFFSET ")
                .push_bind(page_offset(limit, filter.page));
        }

        let rows = qb
            .build_query_as::<MessageRow>()
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err("searching messages"))?;

        Ok(rows.into_iter().map(StoredMessage::from).collect())
    }

    /// Most recent message in a chat with `jid` or sent by `jid`.
    pub async fn last_interaction(&self, jid: &str) -> StorageResult<Option<StoredMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type
            FROM messages
            WHERE chat_jid = ? OR sender = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(jid)
        .bind(jid)
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err("fetching last interaction"))?;

        Ok(row.map(StoredMessage::from))
    }

    /// Count stored messages, optionally restricted to one chat.
    pub async fn count_messages(&self, chat_jid: Option<&str>) -> StorageResult<i64> {
        let count = match chat_jid {
            Some(jid) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE chat_jid = ?")
                    .bind(jid)
                    .fetch_one(self.db.pool())
                    .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
                    .fetch_one(self.db.pool())
                    .await
            }
        }
        .map_err(db_err("counting messages"))?;

        Ok(count)
    }
}
