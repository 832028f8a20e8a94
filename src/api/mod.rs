//! API layer - HTTP handlers and routing
//!
//! Route groups:
//! - `/api/news` - REST gateway over the relational news table
//! - `/api/v1/news` - public news reads
//! - `/api/v1/forum` - forum posts and votes
//! - `/api/v1/admin` - admin login and news management
//! - `/health` - liveness

pub mod admin;
pub mod forum;
pub mod gateway;
pub mod health;
pub mod middleware;
pub mod news;

use axum::{
    http::{header, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{AdminClaim, ApiError, AppState};

/// Build the versioned API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = admin::public_router().merge(admin::protected_router(state));

    Router::new()
        .nest("/news", news::router())
        .nest("/forum", forum::router())
        .nest("/admin", admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(gateway::router())
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/health", get(health::health))
        .fallback(middleware::endpoint_not_found)
        .layer(axum_middleware::from_fn(middleware::answer_options))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
