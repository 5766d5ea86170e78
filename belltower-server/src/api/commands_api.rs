use crate::api::screens_api::find_screen;
use crate::models::{Command, NewCommand};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use belltower_core::models as wire;
use belltower_core::sync::{ChangeKind, Stream};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CreateCommandRequest {
    /// Target screen; omit to broadcast to every screen.
    pub screen_id: Option<String>,
    pub cmd: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Writes a one-shot command row and pushes it to subscribed displays.
/// There is no acknowledgment: a display that is offline right now misses it.
pub async fn create_command(
    State(state): State<AppState>,
    Json(req): Json<CreateCommandRequest>,
) -> Result<Json<wire::Command>, StatusCode> {
    use crate::schema::commands;

    let cmd = req.cmd.trim().to_string();
    if cmd.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(target) = &req.screen_id {
        find_screen(&mut conn, target)?;
    }

    let new_command = NewCommand {
        id: uuid::Uuid::new_v4().to_string(),
        screen_id: req.screen_id,
        cmd,
        payload: req.payload.map(|p| p.to_string()),
        created_at: Utc::now().naive_utc(),
    };

    let command = diesel::insert_into(commands::table)
        .values(&new_command)
        .returning(Command::as_select())
        .get_result(&mut conn)
        .map_err(|e| {
            tracing::error!("Failed to insert command: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let command = wire::Command::from(command);
    tracing::info!(
        "Command '{}' sent to {}",
        command.cmd,
        command.screen_id.as_deref().unwrap_or("all screens")
    );
    state.hub.publish_row(
        Stream::Commands,
        ChangeKind::Insert,
        command.screen_id.clone(),
        Some(&command),
    );

    Ok(Json(command))
}
