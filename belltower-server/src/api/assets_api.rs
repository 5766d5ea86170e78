use crate::models::{Asset, NewAsset, UpdateAsset};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use belltower_core::models::{self as wire, AssetKind};
use belltower_core::sync::{ChangeKind, Stream};
use diesel::prelude::*;
use serde::Deserialize;

/// Image dwell time used when the uploader does not pick one.
const DEFAULT_IMAGE_SECONDS: i32 = 10;

#[derive(Deserialize)]
pub struct CreateAssetRequest {
    pub screen_id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub url: String,
    pub public_id: Option<String>,
    pub duration: Option<i32>,
    pub order: Option<i32>,
}

fn to_wire(asset: Asset) -> Result<wire::Asset, StatusCode> {
    let asset_id = asset.id.clone();
    wire::Asset::try_from(asset).map_err(|e| {
        tracing::error!("Asset {} is unreadable: {}", asset_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub async fn list_screen_assets(
    State(state): State<AppState>,
    Path(screen): Path<String>,
) -> Result<Json<Vec<wire::Asset>>, StatusCode> {
    use crate::schema::assets::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let results = assets
        .filter(screen_id.eq(&screen))
        .order((position.asc(), created_at.asc()))
        .select(Asset::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let playlist = results
        .into_iter()
        .map(to_wire)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(playlist))
}

pub async fn create_asset(
    State(state): State<AppState>,
    Json(req): Json<CreateAssetRequest>,
) -> Result<Json<wire::Asset>, StatusCode> {
    use crate::schema::assets;

    let duration = req.duration.unwrap_or(DEFAULT_IMAGE_SECONDS);
    if req.url.trim().is_empty() || req.screen_id.trim().is_empty() || duration <= 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // New uploads go to the end of the playlist.
    let position = match req.order {
        Some(order) => order,
        None => assets::table
            .filter(assets::screen_id.eq(&req.screen_id))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)? as i32,
    };

    let new_asset = NewAsset {
        id: uuid::Uuid::new_v4().to_string(),
        screen_id: req.screen_id,
        asset_type: req.kind.as_str().to_string(),
        url: req.url,
        public_id: req.public_id,
        duration,
        position,
    };

    let asset = diesel::insert_into(assets::table)
        .values(&new_asset)
        .returning(Asset::as_select())
        .get_result(&mut conn)
        .map_err(|e| {
            tracing::error!("Failed to create asset: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let asset = to_wire(asset)?;
    state.hub.publish_row(
        Stream::Assets,
        ChangeKind::Insert,
        Some(asset.screen_id.clone()),
        Some(&asset),
    );

    Ok(Json(asset))
}

/// Reorders an asset or changes its dwell time.
pub async fn update_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Json(updates): Json<UpdateAsset>,
) -> Result<Json<wire::Asset>, StatusCode> {
    use crate::schema::assets::dsl::*;

    if matches!(updates.duration, Some(d) if d <= 0) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if updates.duration.is_none() && updates.position.is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let asset = diesel::update(assets.filter(id.eq(&asset_id)))
        .set(&updates)
        .returning(Asset::as_select())
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    let asset = to_wire(asset)?;
    state.hub.publish_row(
        Stream::Assets,
        ChangeKind::Update,
        Some(asset.screen_id.clone()),
        Some(&asset),
    );

    Ok(Json(asset))
}

pub async fn delete_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    use crate::schema::assets::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let removed = diesel::delete(assets.filter(id.eq(&asset_id)))
        .returning(Asset::as_select())
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    state.hub.publish_row::<wire::Asset>(
        Stream::Assets,
        ChangeKind::Delete,
        Some(removed.screen_id),
        None,
    );

    Ok(StatusCode::NO_CONTENT)
}
