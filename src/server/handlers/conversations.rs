use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = state.history.list_conversations().await?;
    Ok(Json(json!({ "conversations": conversations })))
}

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id = state.history.create_conversation(payload.title).await?;
    let conversation = state.history.get_conversation(&conversation_id).await?;
    Ok(Json(json!({ "conversation": conversation })))
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .history
        .get_conversation(&conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;

    let messages = state.history.get_history(&conversation_id, 100).await?;
    Ok(Json(json!({
        "conversation": conversation,
        "messages": messages,
    })))
}

pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.history.delete_conversation(&conversation_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Conversation not found".to_string()));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn get_conversation_messages(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(100);

    let messages = state.history.get_history(&conversation_id, limit).await?;
    let formatted: Vec<Value> = messages
        .into_iter()
        .map(|msg| {
            json!({
                "role": msg.role,
                "content": msg.content,
                "metadata": msg.metadata,
                "created_at": msg.created_at,
            })
        })
        .collect();

    Ok(Json(json!({ "messages": formatted })))
}

pub async fn get_conversation_context(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let context = state.chat.context_info(&conversation_id).await?;
    Ok(Json(json!({
        "conversation_id": conversation_id,
        "documents": context,
    })))
}
