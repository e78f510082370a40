pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod queue;
pub mod registry;
pub mod room;
pub mod session;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(config);

    // The query API is world-readable; the WebSocket endpoint enforces its
    // own stricter origin allow-list before upgrade.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/rooms", axum::routing::get(api::get_rooms))
        .route("/rooms/{code}", axum::routing::get(api::get_room))
        .layer(cors);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .nest("/api", api_routes)
        .with_state(state.clone());

    (app, state)
}
