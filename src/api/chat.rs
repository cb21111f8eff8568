use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::{
    error::Result,
    models::{ApiResponse, Conversation},
    services::chat::{ChatReply, ChatRequest},
};

use super::{ApiJson, AppState};

/// POST /api/chat
///
/// Failures inside a turn come back as a normal reply with intent `error`;
/// only invalid input and rate limiting produce an error status.
pub async fn send_message(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ApiResponse<ChatReply>>> {
    let reply = state.chat_service().respond(req).await?;
    Ok(Json(ApiResponse::success(reply)))
}

/// GET /api/chat/{conversation_id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ApiResponse<Conversation>>> {
    let conversation = state.chat_service().history(&conversation_id).await?;
    Ok(Json(ApiResponse::success(conversation)))
}

/// DELETE /api/chat/{conversation_id}
pub async fn clear_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    state.chat_service().clear(&conversation_id).await?;
    Ok(Json(ApiResponse::success(
        json!({ "conversationId": conversation_id, "cleared": true }),
    )))
}
