//! Response generation.
//!
//! Wraps the LLM provider behind the two entry points the orchestrator
//! needs: context-augmented and plain generation. Both fail open — a
//! provider outage degrades to a fixed apology instead of failing the chat
//! turn; the underlying error is logged.

use std::sync::Arc;

use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::rag::types::DocumentChunk;

const APOLOGY: &str =
    "I encountered an error while generating a response. Please try again.";

const CONTEXT_GUIDELINES: &str = "\
You are a helpful AI assistant. Answer the user's question based on the \
provided context documents.

Guidelines:
- Use only information from the provided context
- If the context doesn't contain enough information, say so clearly
- Be concise but comprehensive
- Cite sources when possible by mentioning the document name
- If multiple documents contain relevant information, synthesize them coherently";

pub struct RagGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: i32,
}

impl RagGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: String,
        temperature: f64,
        max_tokens: i32,
    ) -> Self {
        Self {
            provider,
            model,
            temperature,
            max_tokens,
        }
    }

    /// Generate using retrieved chunks. An empty chunk slice falls through
    /// to plain generation, so callers never need to probe capabilities.
    pub async fn generate_with_context(
        &self,
        query: &str,
        chunks: &[DocumentChunk],
        history: &[ChatMessage],
    ) -> String {
        if chunks.is_empty() {
            return self.generate_without_context(query, history).await;
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(format!(
            "{}\n\nContext documents:\n{}",
            CONTEXT_GUIDELINES,
            format_context(chunks)
        )));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(query));

        self.complete(messages).await
    }

    pub async fn generate_without_context(
        &self,
        query: &str,
        history: &[ChatMessage],
    ) -> String {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(query));

        self.complete(messages).await
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> String {
        let request =
            ChatRequest::new(messages).with_sampling(self.temperature, self.max_tokens);

        match self.provider.chat(request, &self.model).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::error!("generation failed: {}", err);
                APOLOGY.to_string()
            }
        }
    }
}

fn format_context(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Document {}:\n{}", i + 1, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
