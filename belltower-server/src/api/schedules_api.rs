use crate::api::ErrorBody;
use crate::models::{NewSchedule, Schedule};
use crate::services::import_service;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use belltower_core::models as wire;
use belltower_core::sync::{ChangeKind, Stream};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ImportRequest {
    pub csv: String,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub count: usize,
}

pub(crate) fn load_screen_schedules(
    conn: &mut SqliteConnection,
    screen: &str,
) -> Result<Vec<Schedule>, diesel::result::Error> {
    use crate::schema::schedules::dsl::*;

    schedules
        .filter(screen_id.eq(screen))
        .order((weekday.asc(), period.asc(), start_time.asc()))
        .select(Schedule::as_select())
        .load(conn)
}

pub async fn list_screen_schedules(
    State(state): State<AppState>,
    Path(screen): Path<String>,
) -> Result<Json<Vec<wire::Schedule>>, StatusCode> {
    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let results = load_screen_schedules(&mut conn, &screen)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(results.into_iter().map(wire::Schedule::from).collect()))
}

// Helper to check for overlaps within the same screen and weekday
fn check_overlap(
    conn: &mut SqliteConnection,
    candidate: &NewSchedule,
    exclude_id: Option<i32>,
) -> Result<bool, diesel::result::Error> {
    use crate::schema::schedules::dsl::*;

    let existing = schedules
        .filter(screen_id.eq(&candidate.screen_id))
        .filter(weekday.eq(candidate.weekday))
        .select(Schedule::as_select())
        .load::<Schedule>(conn)?;

    let candidate = wire::Schedule::from(candidate.clone());
    Ok(existing
        .into_iter()
        .filter(|s| Some(s.id) != exclude_id)
        .any(|s| candidate.overlaps(&wire::Schedule::from(s))))
}

fn validated(new_schedule: NewSchedule) -> Result<NewSchedule, StatusCode> {
    new_schedule.normalized().map_err(|e| {
        tracing::debug!("Rejected schedule: {}", e);
        StatusCode::BAD_REQUEST
    })
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(new_schedule): Json<NewSchedule>,
) -> Result<Json<wire::Schedule>, StatusCode> {
    use crate::schema::schedules;

    let new_schedule = validated(new_schedule)?;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let has_overlap = check_overlap(&mut conn, &new_schedule, None).map_err(|e| {
        tracing::error!("Overlap check failed: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if has_overlap {
        return Err(StatusCode::CONFLICT);
    }

    let schedule = diesel::insert_into(schedules::table)
        .values(&new_schedule)
        .returning(Schedule::as_select())
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let schedule = wire::Schedule::from(schedule);
    state.hub.publish_row(
        Stream::Schedules,
        ChangeKind::Insert,
        Some(schedule.screen_id.clone()),
        Some(&schedule),
    );

    Ok(Json(schedule))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<i32>,
    Json(updates): Json<NewSchedule>,
) -> Result<Json<wire::Schedule>, StatusCode> {
    use crate::schema::schedules::dsl::*;

    let updates = validated(updates)?;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let previous = schedules
        .filter(id.eq(schedule_id))
        .select(Schedule::as_select())
        .first(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    let has_overlap = check_overlap(&mut conn, &updates, Some(schedule_id)).map_err(|e| {
        tracing::error!("Overlap check failed: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if has_overlap {
        return Err(StatusCode::CONFLICT);
    }

    let schedule = diesel::update(schedules.filter(id.eq(schedule_id)))
        .set(&updates)
        .returning(Schedule::as_select())
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let schedule = wire::Schedule::from(schedule);
    if previous.screen_id != schedule.screen_id {
        // Moved to another screen: the old screen loses the row.
        state.hub.publish_row::<wire::Schedule>(
            Stream::Schedules,
            ChangeKind::Delete,
            Some(previous.screen_id),
            None,
        );
    }
    state.hub.publish_row(
        Stream::Schedules,
        ChangeKind::Update,
        Some(schedule.screen_id.clone()),
        Some(&schedule),
    );

    Ok(Json(schedule))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<i32>,
) -> Result<StatusCode, StatusCode> {
    use crate::schema::schedules::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let removed = diesel::delete(schedules.filter(id.eq(schedule_id)))
        .returning(Schedule::as_select())
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    state.hub.publish_row::<wire::Schedule>(
        Stream::Schedules,
        ChangeKind::Delete,
        Some(removed.screen_id),
        None,
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Bulk timetable import. Every row is validated before anything is written,
/// and the insert itself is a single transaction.
pub async fn import_schedules(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, (StatusCode, Json<ErrorBody>)> {
    let rows = import_service::parse_schedule_csv(&req.csv).map_err(|e| {
        tracing::warn!("Schedule import rejected: {}", e);
        (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string())))
    })?;

    let mut conn = state.db.get().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(e.to_string())),
        )
    })?;

    let inserted = import_service::insert_schedules(&mut conn, &rows).map_err(|e| {
        tracing::error!("Schedule import failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(e.to_string())),
        )
    })?;

    for schedule in inserted.iter().cloned().map(wire::Schedule::from) {
        state.hub.publish_row(
            Stream::Schedules,
            ChangeKind::Insert,
            Some(schedule.screen_id.clone()),
            Some(&schedule),
        );
    }

    tracing::info!("Imported {} schedule rows", inserted.len());
    Ok(Json(ImportResponse {
        success: true,
        count: inserted.len(),
    }))
}
