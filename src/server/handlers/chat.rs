use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    pub conversation_id: String,
    pub max_chunks: Option<usize>,
    pub similarity_threshold: Option<f32>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.conversation_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "conversation_id must not be empty".to_string(),
        ));
    }

    let outcome = state
        .chat
        .chat(
            &payload.message,
            &payload.conversation_id,
            payload.max_chunks,
            payload.similarity_threshold,
        )
        .await?;

    Ok(Json(json!({
        "conversation_id": outcome.conversation_id,
        "response": outcome.response,
        "confidence": outcome.confidence,
        "sources": outcome.sources,
    })))
}
