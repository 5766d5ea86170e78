use crate::services::upload_signing::{self, UploadSignature};
use crate::AppState;
use axum::{extract::State, Json};
use chrono::Utc;

/// Signs a direct upload into the configured media folder.
pub async fn sign_upload(State(state): State<AppState>) -> Json<UploadSignature> {
    let uploads = &state.config.uploads;
    let timestamp = Utc::now().timestamp();

    Json(UploadSignature {
        signature: upload_signing::sign(&uploads.folder, timestamp, &uploads.api_secret),
        timestamp,
        api_key: uploads.api_key.clone(),
        cloud_name: uploads.cloud_name.clone(),
    })
}
