pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::recommendation::handlers as recommendation;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Recommendation API
        .route(
            "/api/v1/recommendations/generate",
            post(recommendation::handle_generate_recommendations),
        )
        .route(
            "/api/v1/scholarships/generate",
            post(recommendation::handle_generate_scholarships),
        )
        // Chat API
        .route("/api/v1/chat", post(chat::handle_chat))
        .route("/api/v1/chat/stream", post(chat::handle_chat_stream))
        .with_state(state)
}
