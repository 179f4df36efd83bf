use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::rag::types::{DocumentSource, DocumentType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadDocumentRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub document_type: String,
    pub conversation_id: String,
    pub content: Option<String>,
    pub path: Option<PathBuf>,
    pub metadata: Option<Value>,
}

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UploadDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    if payload.conversation_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "conversation_id must not be empty".to_string(),
        ));
    }

    let source = match (payload.content, payload.path) {
        (Some(content), None) => DocumentSource::Inline(content),
        (None, Some(path)) => DocumentSource::Path(path),
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of content or path is required".to_string(),
            ))
        }
    };

    let document = state
        .documents
        .upload(
            &payload.name,
            DocumentType::parse(&payload.document_type),
            source,
            &payload.conversation_id,
            payload.metadata.unwrap_or(Value::Object(serde_json::Map::new())),
        )
        .await?;

    // Processing is synchronous; a failure leaves the document in Failed
    // state and surfaces as the response.
    state.documents.process(&document.id).await?;

    let document = state
        .documents
        .get(&document.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    Ok(Json(json!({ "document": document })))
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id = params
        .get("conversation_id")
        .ok_or_else(|| ApiError::BadRequest("conversation_id is required".to_string()))?;

    let documents = state.documents.list_for_conversation(conversation_id).await?;
    Ok(Json(json!({ "documents": documents })))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state
        .documents
        .get(&document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    Ok(Json(json!({ "document": document })))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.documents.delete(&document_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }
    Ok(Json(json!({ "deleted": true })))
}
