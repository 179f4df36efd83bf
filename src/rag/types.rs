//! Domain types for the retrieval pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_MAX_CHUNKS: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DocumentStatus::Pending),
            "processing" => Some(DocumentStatus::Processing),
            "processed" => Some(DocumentStatus::Processed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Image,
    Text,
    #[serde(untagged)]
    Other(String),
}

impl DocumentType {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Image => "image",
            DocumentType::Text => "text",
            DocumentType::Other(name) => name,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "pdf" => DocumentType::Pdf,
            "image" => DocumentType::Image,
            "text" => DocumentType::Text,
            other => DocumentType::Other(other.to_string()),
        }
    }
}

/// Where the raw bytes of a document come from: inline content (manual
/// upload) or a path on disk (PDF and friends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum DocumentSource {
    Inline(String),
    Path(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub document_type: DocumentType,
    pub source: DocumentSource,
    pub conversation_id: String,
    pub status: DocumentStatus,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        document_type: DocumentType,
        source: DocumentSource,
        conversation_id: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            document_type,
            source,
            conversation_id: conversation_id.into(),
            status: DocumentStatus::Pending,
            metadata,
            created_at: Utc::now(),
        }
    }

    // Status transitions are one-directional; terminal states are
    // Processed and Failed. Retry requires a re-upload.
    pub fn mark_processing(&mut self) {
        self.status = DocumentStatus::Processing;
    }

    pub fn mark_processed(&mut self) {
        self.status = DocumentStatus::Processed;
    }

    pub fn mark_failed(&mut self) {
        self.status = DocumentStatus::Failed;
    }

    pub fn is_processed(&self) -> bool {
        self.status == DocumentStatus::Processed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub conversation_id: String,
    pub content: String,
    /// Zero-based position within the owning document.
    pub chunk_index: usize,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Value,
}

impl DocumentChunk {
    pub fn new(
        document_id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
        chunk_index: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            conversation_id: conversation_id.into(),
            content: content.into(),
            chunk_index,
            embedding: None,
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Parameters of a single retrieval request. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagQuery {
    pub query: String,
    pub conversation_id: String,
    pub max_chunks: usize,
    pub similarity_threshold: f32,
}

impl RagQuery {
    pub fn new(query: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: conversation_id.into(),
            max_chunks: DEFAULT_MAX_CHUNKS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_limits(mut self, max_chunks: usize, similarity_threshold: f32) -> Self {
        self.max_chunks = max_chunks;
        self.similarity_threshold = similarity_threshold;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResult {
    pub query: RagQuery,
    pub chunks: Vec<DocumentChunk>,
    pub response: String,
    /// Mean similarity of the retrieved chunks to the query; 0.0 when no
    /// context was used. A transparency signal, not a gate.
    pub confidence: f32,
}

impl RagResult {
    pub fn has_relevant_context(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Unique document ids across the retrieved chunks, first-seen order.
    pub fn source_documents(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for chunk in &self.chunks {
            if !seen.contains(&chunk.document_id) {
                seen.push(chunk.document_id.clone());
            }
        }
        seen
    }
}
