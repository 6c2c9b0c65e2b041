//! HTTP control surface.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::{
    ChatDetail, DEFAULT_MESSAGE_LIMIT, HealthResponse, MAX_MESSAGE_LIMIT, SendRequest, ToolCall,
};
pub use routes::create_router;
pub use state::AppState;
