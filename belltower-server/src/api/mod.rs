pub mod assets_api;
pub mod commands_api;
pub mod schedules_api;
pub mod screens_api;
pub mod uploads_api;

use crate::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Serialize;

/// Error payload for endpoints whose contract carries a message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Screens
        .route(
            "/screens",
            get(screens_api::list_screens).post(screens_api::create_screen),
        )
        .route(
            "/screens/:id",
            get(screens_api::get_screen)
                .put(screens_api::update_screen)
                .delete(screens_api::delete_screen),
        )
        .route("/screens/:id/status", get(screens_api::get_screen_status))
        .route("/screens/:id/assets", get(assets_api::list_screen_assets))
        .route(
            "/screens/:id/schedules",
            get(schedules_api::list_screen_schedules),
        )
        // Assets
        .route("/assets", post(assets_api::create_asset))
        .route(
            "/assets/:id",
            put(assets_api::update_asset).delete(assets_api::delete_asset),
        )
        // Schedules
        .route("/schedules", post(schedules_api::create_schedule))
        .route("/schedules/import", post(schedules_api::import_schedules))
        .route(
            "/schedules/:id",
            put(schedules_api::update_schedule).delete(schedules_api::delete_schedule),
        )
        // Commands
        .route("/commands", post(commands_api::create_command))
        .route("/uploads/sign", get(uploads_api::sign_upload))
}
