use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::render_metrics))
        // Live push channel
        .route("/ws", get(handlers::ws::handler))
        // Query API for late joiners
        .route("/api/outcomes/recent", get(handlers::outcomes::recent))
        .route("/api/signals/recent", get(handlers::signals::recent))
        .route("/api/signals/:id", get(handlers::signals::detail))
        .route("/api/stats", get(handlers::signals::stats))
        .route("/api/status", get(handlers::status::status))
        // Runtime config
        .route("/api/config", get(handlers::config::get_config).put(handlers::config::update_config))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
