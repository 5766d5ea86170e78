pub mod api;
pub mod config;
pub mod db;
pub mod events;
pub mod models;
pub mod schema;
pub mod services;
pub mod websocket;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::db::DbPool;
use crate::events::ChangeHub;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub hub: ChangeHub,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            hub: ChangeHub::new(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::routes())
        .route("/ws", get(websocket::ws_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
