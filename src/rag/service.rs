//! Retrieval-augmented query orchestration.
//!
//! `query_with_rag` is the heart of the pipeline: it decides whether a
//! conversation has any context worth searching, retrieves the best-matching
//! chunks, and routes generation through the context-augmented or plain
//! path. Retrieval failures surface as errors; generation failures are
//! absorbed downstream by [`RagGenerator`].

use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::documents::DocumentService;
use crate::embedding::{try_cosine_similarity, EmbeddingService};
use crate::generation::RagGenerator;
use crate::llm::ChatMessage;

use super::store::ChunkStore;
use super::types::{RagQuery, RagResult, DEFAULT_MAX_CHUNKS, DEFAULT_SIMILARITY_THRESHOLD};

pub struct RagService {
    embeddings: EmbeddingService,
    chunks: Arc<dyn ChunkStore>,
    documents: Arc<DocumentService>,
    generator: Arc<RagGenerator>,
}

impl RagService {
    pub fn new(
        embeddings: EmbeddingService,
        chunks: Arc<dyn ChunkStore>,
        documents: Arc<DocumentService>,
        generator: Arc<RagGenerator>,
    ) -> Self {
        Self {
            embeddings,
            chunks,
            documents,
            generator,
        }
    }

    /// Answer a query against the conversation's processed documents.
    ///
    /// When the conversation has no processed documents the query is never
    /// embedded; the request goes straight to plain generation with
    /// confidence 0.0. The same fallback applies when retrieval finds no
    /// chunk at or above the threshold, so a near-miss corpus and an empty
    /// one are indistinguishable to the caller.
    pub async fn query_with_rag(
        &self,
        query: &str,
        conversation_id: &str,
        history: &[ChatMessage],
        max_chunks: Option<usize>,
        similarity_threshold: Option<f32>,
    ) -> Result<RagResult, ApiError> {
        let rag_query = RagQuery::new(query, conversation_id).with_limits(
            max_chunks.unwrap_or(DEFAULT_MAX_CHUNKS),
            similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
        );

        let processed = self
            .documents
            .get_processed_for_conversation(conversation_id)
            .await?;
        if processed.is_empty() {
            tracing::debug!(conversation_id, "no processed documents, skipping retrieval");
            let response = self.generator.generate_without_context(query, history).await;
            return Ok(RagResult {
                query: rag_query,
                chunks: Vec::new(),
                response,
                confidence: 0.0,
            });
        }

        let query_embedding = self.embeddings.embed(query).await?;
        let chunks = self
            .chunks
            .search_similar_chunks(
                &query_embedding,
                conversation_id,
                rag_query.max_chunks,
                rag_query.similarity_threshold,
            )
            .await?;

        if chunks.is_empty() {
            tracing::debug!(conversation_id, "no chunks above threshold, answering without context");
            let response = self.generator.generate_without_context(query, history).await;
            return Ok(RagResult {
                query: rag_query,
                chunks,
                response,
                confidence: 0.0,
            });
        }

        let response = self
            .generator
            .generate_with_context(query, &chunks, history)
            .await;
        let confidence = mean_similarity(&query_embedding, &chunks);

        tracing::info!(
            conversation_id,
            chunks = chunks.len(),
            confidence,
            "answered with retrieved context"
        );

        Ok(RagResult {
            query: rag_query,
            chunks,
            response,
            confidence,
        })
    }

    /// Human-readable list of the conversation's processed documents,
    /// one `"name (type)"` entry each.
    pub async fn context_summary(&self, conversation_id: &str) -> Result<Vec<String>, ApiError> {
        let processed = self
            .documents
            .get_processed_for_conversation(conversation_id)
            .await?;
        Ok(processed
            .iter()
            .map(|d| format!("{} ({})", d.name, d.document_type.as_str()))
            .collect())
    }
}

/// Mean cosine similarity between the query and the retrieved chunks; 0.0
/// when no chunk has a similarity. Undefined similarities (missing or
/// zero-norm embeddings) are skipped, not averaged in as 0.
fn mean_similarity(
    query_embedding: &[f32],
    chunks: &[super::types::DocumentChunk],
) -> f32 {
    let scores: Vec<f32> = chunks
        .iter()
        .filter_map(|c| c.embedding.as_deref())
        .filter_map(|e| try_cosine_similarity(query_embedding, e))
        .collect();
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f32>() / scores.len() as f32
}
