//! Storedesk development backend.
//!
//! A stand-in for the back-office API with just enough surface to exercise
//! the notification client: login, refresh rotation, the push stream, the two
//! count endpoints and a publisher for demo events. State lives in memory.

use axum::{
    routing::{get, post},
    Router,
};
use storedesk_shared::api;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use state::AppState;

/// Build the router over `state`.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Auth
        .route(api::LOGIN_PATH, post(routes::auth::login))
        .route(api::REFRESH_PATH, post(routes::auth::refresh))
        // Counts
        .route(api::PENDING_ORDERS_COUNT_PATH, get(routes::counts::pending_orders))
        .route(api::NEW_CALL_REQUESTS_COUNT_PATH, get(routes::counts::new_call_requests))
        // Development
        .route(api::DEV_EVENTS_PATH, post(routes::events::publish))
        // WebSocket
        .route(api::STREAM_PATH, get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the router on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}
