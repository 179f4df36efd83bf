//! ChunkStore trait — abstract interface for chunk storage backends.
//!
//! Backends persist chunks with their embeddings, scoped by conversation,
//! and answer exact top-k cosine similarity queries. Implementations:
//! `MemoryChunkStore` (tests, embedded use) and `SqliteChunkStore`.

use async_trait::async_trait;

use super::types::DocumentChunk;
use crate::core::errors::ApiError;

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persist chunks, generating embeddings in one batched provider call
    /// for any chunk that lacks one. Returns the stored chunks. Empty input
    /// is a no-op.
    async fn save_chunks(
        &self,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Vec<DocumentChunk>, ApiError>;

    /// All chunks for a document, in insertion order.
    async fn get_chunks_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentChunk>, ApiError>;

    /// Remove all chunks for a document. Returns whether anything was
    /// removed, so a second call reports `false`.
    async fn delete_chunks_by_document(&self, document_id: &str) -> Result<bool, ApiError>;

    /// Top `max_results` chunks of the conversation with similarity to
    /// `query_embedding` at or above `similarity_threshold`, ordered by
    /// similarity descending; ties keep insertion order.
    async fn search_similar_chunks(
        &self,
        query_embedding: &[f32],
        conversation_id: &str,
        max_results: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<DocumentChunk>, ApiError>;
}
