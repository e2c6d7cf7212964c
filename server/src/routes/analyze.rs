//! Scan analysis

use axum::extract::{Multipart, State};
use axum::Json;
use tumorscan::AnalysisResult;

use super::{read_file_field, run_blocking};
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

const ANALYZE_FAILED: &str = "Error analyzing image";

/// POST /api/analyze - Store a scan and classify it
///
/// Storage and the model run on a blocking worker; the processed image
/// takes the generated upload name.
pub async fn analyze_image(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ApiResult<Json<AnalysisResult>> {
    let file = read_file_field(&mut multipart, "image")
        .await?
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let result = run_blocking(ANALYZE_FAILED, move || {
        let stored = state
            .uploads
            .save_upload("image", &file.file_name, &file.bytes)?;
        state.detector.analyze(&stored.path, &stored.file_name)
    })
    .await?;

    Ok(Json(result))
}
