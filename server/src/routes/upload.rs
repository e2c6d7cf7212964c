//! Plain scan upload

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use super::{read_file_field, run_blocking};
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub image_url: String,
}

/// POST /api/upload - Store a scan under uploads/original
pub async fn upload_image(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let file = read_file_field(&mut multipart, "image")
        .await?
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let original_name = file.file_name.clone();
    let stored = run_blocking("Error uploading file", move || {
        state
            .uploads
            .save_upload("image", &file.file_name, &file.bytes)
    })
    .await?;

    info!("Uploaded {} as {}", original_name, stored.file_name);
    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully".to_string(),
        image_url: stored.url(),
    }))
}
