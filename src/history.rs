//! Conversation history persistence.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::core::db::open_pool;
use crate::core::errors::ApiError;
use crate::llm::ChatMessage;

const SCHEMA_VERSION: i64 = 1;
const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";
const MAX_HISTORY_LIMIT: i64 = 1000;
const MAX_TITLE_LEN: usize = 160;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationInfo {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub metadata: Value,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let pool = open_pool(&db_path).await?;
        Self::with_pool(pool).await
    }

    /// Reuse an existing pool so history shares the application database.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, ApiError> {
        let store = Self { pool };
        store.init_db().await?;
        Ok(store)
    }

    async fn init_db(&self) -> Result<(), ApiError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        if version != SCHEMA_VERSION {
            self.rebuild_schema().await?;
        }

        Ok(())
    }

    async fn rebuild_schema(&self) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("DROP TABLE IF EXISTS messages")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query("DROP TABLE IF EXISTS conversations")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "\
            CREATE TABLE conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK(length(trim(title)) > 0),
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "\
            CREATE TABLE messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK(role IN ('user', 'assistant', 'system')),
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX idx_conversations_updated_at ON conversations(updated_at DESC)")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query(
            "CREATE INDEX idx_messages_conversation_id_id ON messages(conversation_id, id)",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        let pragma = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
        sqlx::query(&pragma)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, ApiError> {
        let rows = sqlx::query(
            "\
            SELECT c.id, c.title, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM messages WHERE conversation_id = c.id) as message_count,
                   (SELECT content FROM messages WHERE conversation_id = c.id ORDER BY id DESC LIMIT 1) as last_message
            FROM conversations c
            ORDER BY c.updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.into_iter()
            .map(conversation_info_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn create_conversation(&self, title: Option<String>) -> Result<String, ApiError> {
        let conversation_id = Uuid::new_v4().to_string();
        let title = normalize_title(title);

        sqlx::query("INSERT INTO conversations (id, title) VALUES (?1, ?2)")
            .bind(&conversation_id)
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(conversation_id)
    }

    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationDetail>, ApiError> {
        let row = sqlx::query(
            "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.map(conversation_detail_from_row)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    /// The most recent `limit` messages of a conversation, returned in
    /// chronological order.
    pub async fn get_history(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let limit = sanitize_limit(limit);

        let rows = sqlx::query(
            "\
            SELECT role, content, metadata, created_at
            FROM (
                SELECT id, role, content, metadata, created_at
                FROM messages
                WHERE conversation_id = ?1
                ORDER BY id DESC
                LIMIT ?2
            )
            ORDER BY id ASC",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.into_iter()
            .map(stored_message_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)
    }

    /// History projected into provider-ready chat messages.
    pub async fn get_chat_history(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let messages = self.get_history(conversation_id, limit).await?;
        Ok(messages
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content,
            })
            .collect())
    }

    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
        metadata: &Value,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        insert_message(&mut tx, conversation_id, role, content, metadata).await?;
        touch_conversation_tx(&mut tx, conversation_id).await?;
        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    /// Persist a user/assistant exchange atomically. The chat flow writes
    /// both sides of a turn or neither.
    pub async fn append_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
        assistant_text: &str,
        assistant_metadata: &Value,
    ) -> Result<(), ApiError> {
        let empty = Value::Object(serde_json::Map::new());
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        insert_message(&mut tx, conversation_id, "user", user_text, &empty).await?;
        insert_message(
            &mut tx,
            conversation_id,
            "assistant",
            assistant_text,
            assistant_metadata,
        )
        .await?;
        touch_conversation_tx(&mut tx, conversation_id).await?;
        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }
}

fn conversation_info_from_row(
    row: sqlx::sqlite::SqliteRow,
) -> Result<ConversationInfo, sqlx::Error> {
    let last_message: Option<String> = row.try_get("last_message")?;
    let preview = last_message.unwrap_or_default().chars().take(100).collect();

    Ok(ConversationInfo {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        message_count: row.try_get("message_count")?,
        preview,
    })
}

fn conversation_detail_from_row(
    row: sqlx::sqlite::SqliteRow,
) -> Result<ConversationDetail, sqlx::Error> {
    Ok(ConversationDetail {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn stored_message_from_row(row: sqlx::sqlite::SqliteRow) -> Result<StoredMessage, sqlx::Error> {
    let raw_metadata: String = row.try_get("metadata")?;
    let metadata =
        serde_json::from_str(&raw_metadata).unwrap_or(Value::Object(serde_json::Map::new()));

    Ok(StoredMessage {
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}

async fn insert_message(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
    role: &str,
    content: &str,
    metadata: &Value,
) -> Result<(), ApiError> {
    ensure_conversation(tx, conversation_id).await?;

    let role = normalize_role(role);
    let payload = serde_json::to_string(metadata).map_err(ApiError::internal)?;

    sqlx::query(
        "\
        INSERT INTO messages (conversation_id, role, content, metadata)
        VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(conversation_id)
    .bind(role)
    .bind(content)
    .bind(payload)
    .execute(&mut **tx)
    .await
    .map_err(ApiError::internal)?;

    Ok(())
}

async fn ensure_conversation(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
) -> Result<(), ApiError> {
    sqlx::query("INSERT OR IGNORE INTO conversations (id, title) VALUES (?1, ?2)")
        .bind(conversation_id)
        .bind(DEFAULT_CONVERSATION_TITLE)
        .execute(&mut **tx)
        .await
        .map_err(ApiError::internal)?;
    Ok(())
}

async fn touch_conversation_tx(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE conversations SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
    )
    .bind(conversation_id)
    .execute(&mut **tx)
    .await
    .map_err(ApiError::internal)?;
    Ok(())
}

fn sanitize_limit(limit: i64) -> i64 {
    if limit <= 0 {
        return 1;
    }
    limit.min(MAX_HISTORY_LIMIT)
}

fn normalize_role(role: &str) -> &'static str {
    match role {
        "assistant" => "assistant",
        "system" => "system",
        _ => "user",
    }
}

fn normalize_title(title: Option<String>) -> String {
    let Some(raw) = title else {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    }

    trimmed.chars().take(MAX_TITLE_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> (HistoryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.db")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn append_and_read_back_in_order() {
        let (store, _dir) = test_store().await;
        let id = store.create_conversation(Some("Test".to_string())).await.unwrap();

        store
            .append_message(&id, "user", "hello", &json!({}))
            .await
            .unwrap();
        store
            .append_message(&id, "assistant", "hi there", &json!({"confidence": 0.9}))
            .await
            .unwrap();

        let history = store.get_history(&id, 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].metadata["confidence"], 0.9);
    }

    #[tokio::test]
    async fn limit_returns_most_recent_chronologically() {
        let (store, _dir) = test_store().await;
        let id = store.create_conversation(None).await.unwrap();
        for i in 0..5 {
            store
                .append_message(&id, "user", &format!("m{i}"), &json!({}))
                .await
                .unwrap();
        }

        let history = store.get_history(&id, 2).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn append_auto_creates_the_conversation() {
        let (store, _dir) = test_store().await;
        store
            .append_message("implicit", "user", "hello", &json!({}))
            .await
            .unwrap();

        let detail = store.get_conversation("implicit").await.unwrap().unwrap();
        assert_eq!(detail.title, DEFAULT_CONVERSATION_TITLE);
    }

    #[tokio::test]
    async fn turns_are_written_atomically_and_scoped() {
        let (store, _dir) = test_store().await;
        store
            .append_turn("a", "question", "answer", &json!({"sources": ["doc-1"]}))
            .await
            .unwrap();
        store
            .append_turn("b", "other", "reply", &json!({}))
            .await
            .unwrap();

        let history = store.get_history("a", 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].metadata["sources"][0], "doc-1");
    }

    #[tokio::test]
    async fn delete_cascades_and_is_idempotent() {
        let (store, _dir) = test_store().await;
        let id = store.create_conversation(None).await.unwrap();
        store
            .append_message(&id, "user", "hello", &json!({}))
            .await
            .unwrap();

        assert!(store.delete_conversation(&id).await.unwrap());
        assert!(!store.delete_conversation(&id).await.unwrap());
        assert!(store.get_history(&id, 10).await.unwrap().is_empty());
        assert!(store.get_conversation(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_reports_counts_and_previews() {
        let (store, _dir) = test_store().await;
        let id = store.create_conversation(Some("First".to_string())).await.unwrap();
        store
            .append_turn(&id, "question", "the final answer", &json!({}))
            .await
            .unwrap();

        let conversations = store.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "First");
        assert_eq!(conversations[0].message_count, 2);
        assert_eq!(conversations[0].preview, "the final answer");
    }
}
