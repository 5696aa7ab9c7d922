pub mod aggregate;
pub mod backends;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod geodesy;
pub mod handlers;
pub mod models;
pub mod search;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::session::Session;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/session", get(handlers::get_session))
        .route(
            "/api/origins/:slot",
            put(handlers::set_origin).delete(handlers::clear_origin),
        )
        .route("/api/origins/:slot/geocode", post(handlers::geocode_origin))
        .route("/api/search", put(handlers::update_search))
        .route("/api/search/expand", post(handlers::expand_radius))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
