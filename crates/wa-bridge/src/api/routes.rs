//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(handlers::health))
        // Outbound control
        .route("/send", post(handlers::send_message))
        .route("/mcp/callTool", post(handlers::call_tool))
        .route("/history-sync", post(handlers::request_history_sync))
        // Stored data
        .route("/chats", get(handlers::list_chats))
        .route("/chats/{jid}", get(handlers::get_chat))
        .route("/chats/{jid}/messages", get(handlers::list_messages))
        .layer(trace_layer)
        .with_state(state)
}
