//! SQLite-backed chunk store.
//!
//! Chunk metadata lives in SQLite; embeddings are stored as little-endian
//! f32 blobs and scored with brute-force cosine similarity in process.
//! Rowid order preserves insertion order.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::store::ChunkStore;
use super::types::DocumentChunk;
use crate::core::db::open_pool;
use crate::core::errors::ApiError;
use crate::embedding::{cosine_similarity, EmbeddingService};

pub struct SqliteChunkStore {
    pool: SqlitePool,
    embeddings: EmbeddingService,
}

impl SqliteChunkStore {
    pub async fn new(db_path: PathBuf, embeddings: EmbeddingService) -> Result<Self, ApiError> {
        let pool = open_pool(&db_path).await?;
        Self::with_pool(pool, embeddings).await
    }

    /// Reuse an existing pool so chunks share the application database.
    pub async fn with_pool(
        pool: SqlitePool,
        embeddings: EmbeddingService,
    ) -> Result<Self, ApiError> {
        let store = Self { pool, embeddings };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_conversation ON chunks(conversation_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> DocumentChunk {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<Value>(&metadata_str)
            .unwrap_or(Value::Object(serde_json::Map::new()));
        let embedding_bytes: Vec<u8> = row.get("embedding");
        let embedding = if embedding_bytes.is_empty() {
            None
        } else {
            Some(Self::deserialize_embedding(&embedding_bytes))
        };
        let chunk_index: i64 = row.get("chunk_index");

        DocumentChunk {
            id: row.get("id"),
            document_id: row.get("document_id"),
            conversation_id: row.get("conversation_id"),
            content: row.get("content"),
            chunk_index: chunk_index.max(0) as usize,
            embedding,
            metadata,
        }
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn save_chunks(
        &self,
        mut chunks: Vec<DocumentChunk>,
    ) -> Result<Vec<DocumentChunk>, ApiError> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let missing: Vec<usize> = chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.has_embedding())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            let texts: Vec<String> = missing
                .iter()
                .map(|&i| chunks[i].content.clone())
                .collect();
            let vectors = self.embeddings.embed_batch(&texts).await?;
            for (&i, vector) in missing.iter().zip(vectors) {
                chunks[i].embedding = Some(vector);
            }
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        for chunk in &chunks {
            let blob = chunk
                .embedding
                .as_deref()
                .map(Self::serialize_embedding)
                .unwrap_or_default();
            let metadata_str =
                serde_json::to_string(&chunk.metadata).map_err(ApiError::internal)?;

            sqlx::query(
                "INSERT OR REPLACE INTO chunks
                     (id, document_id, conversation_id, content, chunk_index, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.conversation_id)
            .bind(&chunk.content)
            .bind(chunk.chunk_index as i64)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }
        tx.commit().await.map_err(ApiError::internal)?;

        Ok(chunks)
    }

    async fn get_chunks_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, document_id, conversation_id, content, chunk_index, metadata, embedding
             FROM chunks
             WHERE document_id = ?1
             ORDER BY rowid",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows.iter().map(Self::row_to_chunk).collect())
    }

    async fn delete_chunks_by_document(&self, document_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_similar_chunks(
        &self,
        query_embedding: &[f32],
        conversation_id: &str,
        max_results: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<DocumentChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, document_id, conversation_id, content, chunk_index, metadata, embedding
             FROM chunks
             WHERE conversation_id = ?1
             ORDER BY rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<(f32, DocumentChunk)> = rows
            .iter()
            .map(Self::row_to_chunk)
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_deref()?;
                let score = cosine_similarity(query_embedding, embedding);
                (score >= similarity_threshold).then_some((score, chunk))
            })
            .collect();

        // Stable sort over rowid order keeps ties in insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);

        Ok(scored.into_iter().map(|(_, chunk)| chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::{ChatRequest, LlmProvider};

    struct UnitProvider;

    #[async_trait]
    impl LlmProvider for UnitProvider {
        fn name(&self) -> &str {
            "unit"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            Ok(String::new())
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, ApiError> {
            // Length-keyed unit vectors keep tests deterministic.
            Ok(inputs
                .iter()
                .map(|t| if t.len() % 2 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    async fn test_store() -> (SqliteChunkStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let embeddings = EmbeddingService::new(Arc::new(UnitProvider), "unit".to_string());
        let store = SqliteChunkStore::new(dir.path().join("chunks.db"), embeddings)
            .await
            .unwrap();
        (store, dir)
    }

    fn chunk_with(
        doc: &str,
        conv: &str,
        content: &str,
        index: usize,
        embedding: Vec<f32>,
    ) -> DocumentChunk {
        let mut chunk = DocumentChunk::new(doc, conv, content, index);
        chunk.embedding = Some(embedding);
        chunk
    }

    #[tokio::test]
    async fn chunks_round_trip_in_insertion_order() {
        let (store, _dir) = test_store().await;
        let chunks: Vec<DocumentChunk> = (0..3)
            .map(|i| chunk_with("doc-1", "chat-1", &format!("c{i}"), i, vec![1.0, 0.0]))
            .collect();
        store.save_chunks(chunks).await.unwrap();

        let loaded = store.get_chunks_by_document("doc-1").await.unwrap();
        let indexes: Vec<usize> = loaded.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(loaded.iter().all(|c| c.has_embedding()));
    }

    #[tokio::test]
    async fn save_generates_missing_embeddings() {
        let (store, _dir) = test_store().await;
        let chunks = vec![DocumentChunk::new("doc-1", "chat-1", "ab", 0)];
        let saved = store.save_chunks(chunks).await.unwrap();
        assert_eq!(saved[0].embedding.as_deref(), Some(&[1.0, 0.0][..]));
    }

    #[tokio::test]
    async fn search_applies_threshold_scope_and_order() {
        let (store, _dir) = test_store().await;
        store
            .save_chunks(vec![
                chunk_with("doc-1", "chat-1", "s90", 0, vec![0.9, 0.43589]),
                chunk_with("doc-1", "chat-1", "s95", 1, vec![0.95, 0.31225]),
                chunk_with("doc-1", "chat-1", "low", 2, vec![0.0, 1.0]),
                chunk_with("doc-2", "chat-2", "other", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store
            .search_similar_chunks(&[1.0, 0.0], "chat-1", 2, 0.7)
            .await
            .unwrap();
        let contents: Vec<&str> = results.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["s95", "s90"]);
    }

    #[tokio::test]
    async fn empty_conversation_yields_empty_result() {
        let (store, _dir) = test_store().await;
        let results = store
            .search_similar_chunks(&[1.0, 0.0], "chat-none", 5, 0.0)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn stores_share_one_pool_over_one_database() {
        use crate::documents::DocumentStore;
        use crate::history::HistoryStore;
        use crate::rag::types::{Document, DocumentSource, DocumentType};

        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("app.db")).await.unwrap();

        let embeddings = EmbeddingService::new(Arc::new(UnitProvider), "unit".to_string());
        let chunks = SqliteChunkStore::with_pool(pool.clone(), embeddings)
            .await
            .unwrap();
        let documents = DocumentStore::with_pool(pool.clone()).await.unwrap();
        let history = HistoryStore::with_pool(pool).await.unwrap();

        let doc = Document::new(
            "a.txt",
            DocumentType::Text,
            DocumentSource::Inline("content".to_string()),
            "chat-1",
            Value::Object(serde_json::Map::new()),
        );
        documents.save(&doc).await.unwrap();
        chunks
            .save_chunks(vec![chunk_with(&doc.id, "chat-1", "ab", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        history
            .append_message("chat-1", "user", "hello", &Value::Object(serde_json::Map::new()))
            .await
            .unwrap();

        assert!(documents.get(&doc.id).await.unwrap().is_some());
        assert_eq!(chunks.get_chunks_by_document(&doc.id).await.unwrap().len(), 1);
        assert_eq!(history.get_history("chat-1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_rows_were_removed() {
        let (store, _dir) = test_store().await;
        store
            .save_chunks(vec![chunk_with("doc-1", "chat-1", "x", 0, vec![1.0])])
            .await
            .unwrap();

        assert!(store.delete_chunks_by_document("doc-1").await.unwrap());
        assert!(!store.delete_chunks_by_document("doc-1").await.unwrap());
    }
}
