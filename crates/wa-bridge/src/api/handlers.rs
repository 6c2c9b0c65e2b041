//! API request handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::gateway::{SendError, SendOutcome};
use crate::store::{Chat, ChatQuery, MessageQuery, StoredMessage};

/// Messages returned when no limit is given.
pub const DEFAULT_MESSAGE_LIMIT: u32 = 20;

/// Upper bound for a single message listing.
pub const MAX_MESSAGE_LIMIT: u32 = 500;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether the session currently has a live protocol connection.
    pub connected: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connected: state.gateway.is_connected(),
    })
}

/// Body of a send request. Missing fields read as empty and are rejected.
#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub message: String,
}

/// Send a text message.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> ApiResult<(StatusCode, Json<SendOutcome>)> {
    deliver(&state, request).await
}

async fn deliver(
    state: &AppState,
    request: SendRequest,
) -> ApiResult<(StatusCode, Json<SendOutcome>)> {
    if request.recipient.is_empty() || request.message.is_empty() {
        return Err(ApiError::bad_request("Recipient and message are required"));
    }

    let result = state
        .gateway
        .send(&request.recipient, &request.message)
        .await;
    Ok((outcome_status(&result), Json(SendOutcome::from(&result))))
}

fn outcome_status(result: &Result<String, SendError>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::OK,
        Err(SendError::NotConnected) => StatusCode::SERVICE_UNAVAILABLE,
        Err(SendError::InvalidRecipient(_) | SendError::Transport(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A named tool invocation.
#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Deserialize)]
struct ChatArgs {
    chat_jid: String,
}

#[derive(Debug, Deserialize)]
struct InteractionArgs {
    jid: String,
}

/// Dispatch a tool call to the matching operation.
pub async fn call_tool(
    State(state): State<AppState>,
    Json(call): Json<ToolCall>,
) -> ApiResult<Response> {
    match call.name.as_str() {
        "send_message" => {
            let request: SendRequest = parse_args(call.args)?;
            Ok(deliver(&state, request).await?.into_response())
        }
        "list_chats" => {
            let query: ChatQuery = parse_optional_args(call.args)?;
            Ok(Json(search_chats(&state, query).await?).into_response())
        }
        "list_messages" => {
            let query: MessageQuery = parse_optional_args(call.args)?;
            Ok(Json(search_messages(&state, query).await?).into_response())
        }
        "get_chat" => {
            let args: ChatArgs = parse_args(call.args)?;
            Ok(Json(chat_detail(&state, &args.chat_jid).await?).into_response())
        }
        "get_last_interaction" => {
            let args: InteractionArgs = parse_args(call.args)?;
            match state.store.last_interaction(&args.jid).await? {
                Some(message) => Ok(Json(message).into_response()),
                None => Err(ApiError::not_found(format!("Messages involving {}", args.jid))),
            }
        }
        other => Err(ApiError::bad_request(format!("Unknown operation: {}", other))),
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> ApiResult<T> {
    serde_json::from_value(args)
        .map_err(|e| ApiError::bad_request(format!("Invalid arguments: {}", e)))
}

/// Like [`parse_args`], but a call without arguments uses the defaults.
fn parse_optional_args<T: DeserializeOwned + Default>(args: Value) -> ApiResult<T> {
    if args.is_null() {
        return Ok(T::default());
    }
    parse_args(args)
}

/// List chats, most recent activity first unless `sort_by=name`.
pub async fn list_chats(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Json<Vec<Chat>>> {
    Ok(Json(search_chats(&state, query).await?))
}

async fn search_chats(state: &AppState, mut query: ChatQuery) -> ApiResult<Vec<Chat>> {
    query.limit = query.limit.map(|limit| limit.clamp(1, MAX_MESSAGE_LIMIT));
    Ok(state.store.search_chats(&query).await?)
}

/// A chat with its newest stored message.
#[derive(Debug, Serialize)]
pub struct ChatDetail {
    #[serde(flatten)]
    pub chat: Chat,
    pub last_message: Option<StoredMessage>,
}

/// Get one chat.
pub async fn get_chat(
    State(state): State<AppState>,
    Path(jid): Path<String>,
) -> ApiResult<Json<ChatDetail>> {
    Ok(Json(chat_detail(&state, &jid).await?))
}

async fn chat_detail(state: &AppState, jid: &str) -> ApiResult<ChatDetail> {
    let chat = state
        .store
        .get_chat(jid)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Chat {}", jid)))?;
    let last_message = state.store.list_messages(jid, 1).await?.into_iter().next();
    Ok(ChatDetail { chat, last_message })
}

/// List the messages of one chat, newest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(jid): Path<String>,
    Query(mut query): Query<MessageQuery>,
) -> ApiResult<Json<Vec<StoredMessage>>> {
    query.chat_jid = Some(jid);
    Ok(Json(search_messages(&state, query).await?))
}

/// Run a message search; a named chat must exist.
async fn search_messages(
    state: &AppState,
    mut query: MessageQuery,
) -> ApiResult<Vec<StoredMessage>> {
    if let Some(jid) = query.chat_jid.as_deref().filter(|jid| !jid.is_empty()) {
        state
            .store
            .get_chat(jid)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Chat {}", jid)))?;
    }
    query.limit = Some(
        query
            .limit
            .unwrap_or(DEFAULT_MESSAGE_LIMIT)
            .clamp(1, MAX_MESSAGE_LIMIT),
    );
    Ok(state.store.search_messages(&query).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct HistorySyncRequest {
    #[serde(default)]
    pub count: Option<u32>,
}

/// Ask the session for a history sync.
pub async fn request_history_sync(
    State(state): State<AppState>,
    body: Option<Json<HistorySyncRequest>>,
) -> (StatusCode, Json<SendOutcome>) {
    let count = body
        .and_then(|Json(request)| request.count)
        .unwrap_or(state.history_sync_count);

    let result = state.gateway.request_history_sync(count).await;
    (outcome_status(&result), Json(SendOutcome::from(&result)))
}
