//! Chat endpoint.
//!
//! `POST /api/chat/send`: the client sends the conversation so far plus a
//! new message and receives the reply together with the updated history.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::chat::{ChatMode, ConversationState};

#[derive(Deserialize)]
pub struct ChatSendRequest {
    #[serde(default)]
    pub history: ConversationState,
    pub message: String,
    #[serde(default)]
    pub mode: ChatMode,
}

#[derive(Serialize)]
pub struct ChatSendResponse {
    pub reply: String,
    pub history: ConversationState,
}

/// `POST /api/chat/send`: one assistant turn.
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(req): Json<ChatSendRequest>,
) -> Result<Json<ChatSendResponse>, ApiError> {
    let core = ctx.core.clone();

    let (reply, history) = tokio::task::spawn_blocking(move || {
        let mut history = req.history;
        core.chat()
            .reply(&mut history, &req.message, req.mode)
            .map(|reply| (reply, history))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("chat task failed: {e}")))??;

    Ok(Json(ChatSendResponse { reply, history }))
}
