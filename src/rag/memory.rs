//! In-memory chunk store.
//!
//! A linear-scan vector store guarded by an `RwLock`: writes (save, delete)
//! serialize structural mutations, reads run concurrently and never observe
//! a partially-deleted state.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::ChunkStore;
use super::types::DocumentChunk;
use crate::core::errors::ApiError;
use crate::embedding::{cosine_similarity, EmbeddingService};

pub struct MemoryChunkStore {
    embeddings: EmbeddingService,
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl MemoryChunkStore {
    pub fn new(embeddings: EmbeddingService) -> Self {
        Self {
            embeddings,
            chunks: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn save_chunks(
        &self,
        mut chunks: Vec<DocumentChunk>,
    ) -> Result<Vec<DocumentChunk>, ApiError> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        // One provider call for everything still missing an embedding.
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

        let mut store = self.chunks.write().await;
        store.extend(chunks.iter().cloned());
        Ok(chunks)
    }

    async fn get_chunks_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentChunk>, ApiError> {
        let store = self.chunks.read().await;
        Ok(store
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn delete_chunks_by_document(&self, document_id: &str) -> Result<bool, ApiError> {
        let mut store = self.chunks.write().await;
        let before = store.len();
        store.retain(|c| c.document_id != document_id);
        Ok(store.len() < before)
    }

    async fn search_similar_chunks(
        &self,
        query_embedding: &[f32],
        conversation_id: &str,
        max_results: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<DocumentChunk>, ApiError> {
        let store = self.chunks.read().await;

        let mut scored: Vec<(f32, &DocumentChunk)> = store
            .iter()
            .filter(|c| c.conversation_id == conversation_id)
            .filter_map(|c| {
                let embedding = c.embedding.as_deref()?;
                let score = cosine_similarity(query_embedding, embedding);
                (score >= similarity_threshold).then_some((score, c))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);

        Ok(scored.into_iter().map(|(_, c)| c.clone()).collect())
    }
}
