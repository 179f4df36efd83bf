//! Chat turn orchestration: history in, retrieval-augmented answer out,
//! both sides of the turn persisted.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::history::HistoryStore;
use crate::rag::RagService;

const HISTORY_WINDOW: i64 = 20;

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub conversation_id: String,
    pub response: String,
    pub confidence: f32,
    pub sources: Vec<String>,
}

pub struct ChatService {
    history: HistoryStore,
    rag: Arc<RagService>,
}

impl ChatService {
    pub fn new(history: HistoryStore, rag: Arc<RagService>) -> Self {
        Self { history, rag }
    }

    /// Run one chat turn. The turn is recorded only after generation
    /// succeeds, so a failed retrieval never leaves a dangling user message.
    pub async fn chat(
        &self,
        message: &str,
        conversation_id: &str,
        max_chunks: Option<usize>,
        similarity_threshold: Option<f32>,
    ) -> Result<ChatOutcome, ApiError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ApiError::BadRequest("message must not be empty".to_string()));
        }

        let history = self
            .history
            .get_chat_history(conversation_id, HISTORY_WINDOW)
            .await?;

        let result = self
            .rag
            .query_with_rag(
                message,
                conversation_id,
                &history,
                max_chunks,
                similarity_threshold,
            )
            .await?;

        let sources = result.source_documents();
        self.history
            .append_turn(
                conversation_id,
                message,
                &result.response,
                &json!({
                    "confidence": result.confidence,
                    "sources": sources,
                }),
            )
            .await?;

        Ok(ChatOutcome {
            conversation_id: conversation_id.to_string(),
            response: result.response,
            confidence: result.confidence,
            sources,
        })
    }

    /// What context the conversation currently has available.
    pub async fn context_info(&self, conversation_id: &str) -> Result<Vec<String>, ApiError> {
        self.rag.context_summary(conversation_id).await
    }
}
