//! Document lifecycle: upload, processing, deletion.

use std::sync::Arc;

use serde_json::Value;

use crate::core::errors::ApiError;
use crate::rag::processor::DocumentProcessor;
use crate::rag::store::ChunkStore;
use crate::rag::types::{Document, DocumentSource, DocumentStatus, DocumentType};

use super::store::DocumentStore;

pub struct DocumentService {
    documents: DocumentStore,
    chunks: Arc<dyn ChunkStore>,
    processor: DocumentProcessor,
}

impl DocumentService {
    pub fn new(
        documents: DocumentStore,
        chunks: Arc<dyn ChunkStore>,
        processor: DocumentProcessor,
    ) -> Self {
        Self {
            documents,
            chunks,
            processor,
        }
    }

    /// Register a document for a conversation. It starts out Pending; call
    /// [`process`](Self::process) to extract, chunk, and embed it.
    pub async fn upload(
        &self,
        name: &str,
        document_type: DocumentType,
        source: DocumentSource,
        conversation_id: &str,
        metadata: Value,
    ) -> Result<Document, ApiError> {
        let document = Document::new(name, document_type, source, conversation_id, metadata);
        self.documents.save(&document).await?;
        tracing::info!(document_id = %document.id, name = %document.name, "document uploaded");
        Ok(document)
    }

    /// Run a document through extraction, chunking, and storage. Returns
    /// `false` for an unknown id. On failure the document is left in Failed
    /// state and the error is returned to the caller.
    pub async fn process(&self, document_id: &str) -> Result<bool, ApiError> {
        let Some(mut document) = self.documents.get(document_id).await? else {
            return Ok(false);
        };

        document.mark_processing();
        self.documents.save(&document).await?;

        match self.process_inner(&document).await {
            Ok(chunk_count) => {
                document.mark_processed();
                self.documents.save(&document).await?;
                tracing::info!(
                    document_id = %document.id,
                    chunks = chunk_count,
                    "document processed"
                );
                Ok(true)
            }
            Err(err) => {
                document.mark_failed();
                self.documents.save(&document).await?;
                tracing::error!(document_id = %document.id, "document processing failed: {}", err);
                Err(err)
            }
        }
    }

    async fn process_inner(&self, document: &Document) -> Result<usize, ApiError> {
        let chunks = self.processor.process_document(document)?;
        let saved = self.chunks.save_chunks(chunks).await?;
        Ok(saved.len())
    }

    pub async fn get(&self, document_id: &str) -> Result<Option<Document>, ApiError> {
        self.documents.get(document_id).await
    }

    pub async fn list_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Document>, ApiError> {
        self.documents.list_by_conversation(conversation_id).await
    }

    pub async fn get_processed_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Document>, ApiError> {
        let documents = self.documents.list_by_conversation(conversation_id).await?;
        Ok(documents.into_iter().filter(|d| d.is_processed()).collect())
    }

    pub async fn get_pending(&self) -> Result<Vec<Document>, ApiError> {
        self.documents.list_by_status(DocumentStatus::Pending).await
    }

    /// Remove a document and its chunks. Chunks go first so a search racing
    /// the delete never surfaces chunks of a document that is already gone.
    pub async fn delete(&self, document_id: &str) -> Result<bool, ApiError> {
        self.chunks.delete_chunks_by_document(document_id).await?;
        self.documents.delete(document_id).await
    }
}
