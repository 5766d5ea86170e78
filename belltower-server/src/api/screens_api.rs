use crate::api::schedules_api::load_screen_schedules;
use crate::models::{NewScreen, Screen, UpdateScreen};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use belltower_core::clock::{ScreenClock, LOCAL_TIMEZONE};
use belltower_core::models as wire;
use belltower_core::sync::{ChangeKind, Stream};
use belltower_core::{resolve_status, CurrentStatus};
use diesel::prelude::*;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CreateScreenRequest {
    pub id: String,
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub settings: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct UpdateScreenRequest {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub settings: Option<serde_json::Value>,
}

fn validate_timezone(timezone: &str) -> Result<(), StatusCode> {
    ScreenClock::parse(timezone)
        .map(|_| ())
        .map_err(|_| StatusCode::BAD_REQUEST)
}

pub async fn list_screens(
    State(state): State<AppState>,
) -> Result<Json<Vec<wire::Screen>>, StatusCode> {
    use crate::schema::screens::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let results = screens
        .order(id.asc())
        .select(Screen::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(results.into_iter().map(wire::Screen::from).collect()))
}

pub async fn get_screen(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
) -> Result<Json<wire::Screen>, StatusCode> {
    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let screen = find_screen(&mut conn, &screen_id)?;
    Ok(Json(screen.into()))
}

pub async fn create_screen(
    State(state): State<AppState>,
    Json(req): Json<CreateScreenRequest>,
) -> Result<Json<wire::Screen>, StatusCode> {
    use crate::schema::screens;

    let screen_id = req.id.trim().to_string();
    if screen_id.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let timezone = req
        .timezone
        .unwrap_or_else(|| LOCAL_TIMEZONE.to_string());
    validate_timezone(&timezone)?;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let existing: i64 = screens::table
        .filter(screens::id.eq(&screen_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if existing > 0 {
        return Err(StatusCode::CONFLICT);
    }

    let new_screen = NewScreen {
        name: req.name.unwrap_or_else(|| format!("Room {}", screen_id)),
        id: screen_id,
        timezone,
        settings: req.settings.map(|s| s.to_string()),
    };

    let screen = diesel::insert_into(screens::table)
        .values(&new_screen)
        .returning(Screen::as_select())
        .get_result(&mut conn)
        .map_err(|e| {
            tracing::error!("Failed to create screen {}: {}", new_screen.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::info!("Created screen {}", screen.id);
    Ok(Json(screen.into()))
}

pub async fn update_screen(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
    Json(req): Json<UpdateScreenRequest>,
) -> Result<Json<wire::Screen>, StatusCode> {
    use crate::schema::screens::dsl::*;

    if let Some(tz) = &req.timezone {
        validate_timezone(tz)?;
    }

    let changes = UpdateScreen {
        name: req.name,
        timezone: req.timezone,
        settings: req.settings.map(|s| s.to_string()),
    };

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if changes.name.is_none() && changes.timezone.is_none() && changes.settings.is_none() {
        return Ok(Json(find_screen(&mut conn, &screen_id)?.into()));
    }

    let screen = diesel::update(screens.filter(id.eq(&screen_id)))
        .set(&changes)
        .returning(Screen::as_select())
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    Ok(Json(screen.into()))
}

/// Deletes the screen together with its playlist and timetable.
pub async fn delete_screen(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    use crate::schema::{assets, schedules, screens};

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let deleted = conn
        .transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(assets::table.filter(assets::screen_id.eq(&screen_id))).execute(conn)?;
            diesel::delete(schedules::table.filter(schedules::screen_id.eq(&screen_id)))
                .execute(conn)?;
            diesel::delete(screens::table.filter(screens::id.eq(&screen_id))).execute(conn)
        })
        .map_err(|e| {
            tracing::error!("Failed to delete screen {}: {}", screen_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }

    for stream in [Stream::Assets, Stream::Schedules] {
        state.hub.publish_row::<serde_json::Value>(
            stream,
            ChangeKind::Delete,
            Some(screen_id.clone()),
            None,
        );
    }

    tracing::info!("Deleted screen {}", screen_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Period status as the screen itself would show it right now.
pub async fn get_screen_status(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
) -> Result<Json<CurrentStatus>, StatusCode> {
    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let screen = find_screen(&mut conn, &screen_id)?;
    let schedules: Vec<wire::Schedule> = load_screen_schedules(&mut conn, &screen_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .into_iter()
        .map(wire::Schedule::from)
        .collect();

    let clock = ScreenClock::parse(&screen.timezone).unwrap_or_else(|e| {
        tracing::warn!("Screen {}: {}, using local clock", screen.id, e);
        ScreenClock::Local
    });

    Ok(Json(resolve_status(&schedules, clock.now())))
}

pub(crate) fn find_screen(
    conn: &mut SqliteConnection,
    screen_id: &str,
) -> Result<Screen, StatusCode> {
    use crate::schema::screens::dsl::*;

    screens
        .filter(id.eq(screen_id))
        .select(Screen::as_select())
        .first(conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })
}
