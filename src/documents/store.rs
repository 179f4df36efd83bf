//! SQLite persistence for documents.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::core::db::open_pool;
use crate::core::errors::ApiError;
use crate::rag::types::{Document, DocumentSource, DocumentStatus, DocumentType};

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let pool = open_pool(&db_path).await?;
        Self::with_pool(pool).await
    }

    /// Reuse an existing pool so documents share the application database.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, ApiError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                document_type TEXT NOT NULL,
                source_kind TEXT NOT NULL CHECK(source_kind IN ('inline', 'path')),
                source TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('pending', 'processing', 'processed', 'failed')),
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_conversation
             ON documents(conversation_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn save(&self, document: &Document) -> Result<(), ApiError> {
        let (source_kind, source) = match &document.source {
            DocumentSource::Inline(content) => ("inline", content.clone()),
            DocumentSource::Path(path) => ("path", path.to_string_lossy().to_string()),
        };
        let metadata = serde_json::to_string(&document.metadata).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT OR REPLACE INTO documents
                 (id, name, document_type, source_kind, source, conversation_id,
                  status, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&document.id)
        .bind(&document.name)
        .bind(document.document_type.as_str())
        .bind(source_kind)
        .bind(&source)
        .bind(&document.conversation_id)
        .bind(document.status.as_str())
        .bind(&metadata)
        .bind(document.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn get(&self, document_id: &str) -> Result<Option<Document>, ApiError> {
        let row = sqlx::query(
            "SELECT id, name, document_type, source_kind, source, conversation_id,
                    status, metadata, created_at
             FROM documents
             WHERE id = ?1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.as_ref().map(row_to_document).transpose()
    }

    pub async fn list_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Document>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, name, document_type, source_kind, source, conversation_id,
                    status, metadata, created_at
             FROM documents
             WHERE conversation_id = ?1
             ORDER BY rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(row_to_document).collect()
    }

    pub async fn list_by_status(&self, status: DocumentStatus) -> Result<Vec<Document>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, name, document_type, source_kind, source, conversation_id,
                    status, metadata, created_at
             FROM documents
             WHERE status = ?1
             ORDER BY rowid",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(row_to_document).collect()
    }

    pub async fn delete(&self, document_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, ApiError> {
    let source_kind: String = row.get("source_kind");
    let source_raw: String = row.get("source");
    let source = match source_kind.as_str() {
        "path" => DocumentSource::Path(source_raw.into()),
        _ => DocumentSource::Inline(source_raw),
    };

    let status_raw: String = row.get("status");
    let status = DocumentStatus::parse(&status_raw)
        .ok_or_else(|| ApiError::Internal(format!("unknown document status: {status_raw}")))?;

    let type_raw: String = row.get("document_type");
    let metadata_str: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata_str)
        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

    let created_raw: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(ApiError::internal)?;

    Ok(Document {
        id: row.get("id"),
        name: row.get("name"),
        document_type: DocumentType::parse(&type_raw),
        source,
        conversation_id: row.get("conversation_id"),
        status,
        metadata,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> (DocumentStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("docs.db")).await.unwrap();
        (store, dir)
    }

    fn make_document(name: &str, conversation: &str) -> Document {
        Document::new(
            name,
            DocumentType::Text,
            DocumentSource::Inline("content".to_string()),
            conversation,
            json!({ "origin": "test" }),
        )
    }

    #[tokio::test]
    async fn documents_round_trip() {
        let (store, _dir) = test_store().await;
        let doc = make_document("a.txt", "chat-1");
        store.save(&doc).await.unwrap();

        let loaded = store.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "a.txt");
        assert_eq!(loaded.status, DocumentStatus::Pending);
        assert_eq!(loaded.document_type, DocumentType::Text);
        assert_eq!(loaded.metadata["origin"], "test");
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let (store, _dir) = test_store().await;
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_updates_in_place() {
        let (store, _dir) = test_store().await;
        let mut doc = make_document("a.txt", "chat-1");
        store.save(&doc).await.unwrap();

        doc.mark_processed();
        store.save(&doc).await.unwrap();

        let loaded = store.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Processed);
        assert_eq!(store.list_by_conversation("chat-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_filters_by_conversation_and_status() {
        let (store, _dir) = test_store().await;
        let mut processed = make_document("a.txt", "chat-1");
        processed.mark_processed();
        let pending = make_document("b.txt", "chat-2");
        store.save(&processed).await.unwrap();
        store.save(&pending).await.unwrap();

        assert_eq!(store.list_by_conversation("chat-1").await.unwrap().len(), 1);
        let pending_docs = store.list_by_status(DocumentStatus::Pending).await.unwrap();
        assert_eq!(pending_docs.len(), 1);
        assert_eq!(pending_docs[0].name, "b.txt");
    }

    #[tokio::test]
    async fn delete_reports_result() {
        let (store, _dir) = test_store().await;
        let doc = make_document("a.txt", "chat-1");
        store.save(&doc).await.unwrap();

        assert!(store.delete(&doc.id).await.unwrap());
        assert!(!store.delete(&doc.id).await.unwrap());
    }
}
