//! Dataset management endpoints
//!
//! Upload labeled scans, inspect counts and model state, start a training
//! run in the background, clear a category.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use tumorscan::backend::{default_device, TrainingBackend};
use tumorscan::training::train_model_with;
use tumorscan::uploads::{validated_extension, MAX_DATASET_FILES};
use tumorscan::{Category, DatasetCounts};

use super::{run_blocking, UploadedFile};
use crate::error::{ApiError, ApiResult};
use crate::jobs::TrainingRun;
use crate::state::SharedState;

const KAGGLE_INSTRUCTIONS: &str = "To use the Kaggle dataset, please manually download it from https://www.kaggle.com/datasets/navoneel/brain-mri-images-for-brain-tumor-detection and upload the images to the app using the dataset upload feature. The dataset should be organized into 'yes' (tumor) and 'no' (non-tumor) categories.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetUploadResponse {
    pub success: bool,
    pub message: String,
    pub file_count: usize,
}

/// POST /api/dataset/upload - Store labeled images in one category
///
/// Expects a `category` text part and up to 100 `images` file parts. Every
/// file is checked before any is written.
pub async fn upload_dataset(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DatasetUploadResponse>> {
    let mut category: Option<String> = None;
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("category") => category = Some(field.text().await?),
            Some("images") => {
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                if files.len() == MAX_DATASET_FILES {
                    return Err(ApiError::bad_request(format!(
                        "Too many files. Upload at most {} images at once",
                        MAX_DATASET_FILES
                    )));
                }
                let bytes = field.bytes().await?;
                files.push(UploadedFile { file_name, bytes });
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let category: Category = category
        .as_deref()
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid category. Must be 'yes' or 'no'"))?;

    for file in &files {
        validated_extension(&file.file_name, file.bytes.len())?;
    }

    let file_count = files.len();
    run_blocking("Error uploading dataset images", move || {
        for file in &files {
            state
                .dataset
                .store_image(category, "images", &file.file_name, &file.bytes)?;
        }
        Ok(())
    })
    .await?;

    info!("Stored {} images in '{}'", file_count, category);
    Ok(Json(DatasetUploadResponse {
        success: true,
        message: format!(
            "Successfully uploaded {} images to the {} category",
            file_count, category
        ),
        file_count,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub exists: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub placeholder: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStatusResponse {
    pub success: bool,
    pub dataset_size: DatasetCounts,
    pub model: ModelStatus,
    pub ready_for_training: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingRun>,
}

/// GET /api/dataset/status - Counts per category, model state, last training run
pub async fn dataset_status(
    State(state): State<SharedState>,
) -> ApiResult<Json<DatasetStatusResponse>> {
    let worker = state.clone();
    let (counts, artifact) = run_blocking("Error getting dataset status", move || {
        Ok((worker.dataset.counts()?, worker.store.artifact_info()))
    })
    .await?;

    Ok(Json(DatasetStatusResponse {
        success: true,
        dataset_size: counts,
        model: ModelStatus {
            exists: artifact.exists,
            last_modified: artifact.last_modified,
            placeholder: artifact.placeholder,
        },
        ready_for_training: counts.ready_for_training(state.config.min_images_per_category),
        training: state.jobs.current().await,
    }))
}

/// POST /api/dataset/train - Start a training run in the background
///
/// Returns as soon as the run is queued; progress and outcome are reported
/// by the status endpoint.
pub async fn start_training(State(state): State<SharedState>) -> ApiResult<Response> {
    let worker = state.clone();
    let counts = run_blocking("Error training model with dataset", move || {
        worker.dataset.counts()
    })
    .await?;

    let min = state.config.min_images_per_category;
    if !counts.ready_for_training(min) {
        let body = json!({
            "success": false,
            "message": format!(
                "Not enough images for training. Upload at least {} images for each category.",
                min
            ),
            "counts": { "yes": counts.yes, "no": counts.no },
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let run = match state.jobs.try_queue(state.config.training.epochs).await {
        Ok(run) => run,
        Err(active) => {
            return Err(ApiError {
                status: StatusCode::CONFLICT,
                message: format!("Training already in progress: {}", active.id),
            })
        }
    };

    info!("Queued training run {}", run.id);
    spawn_training(state.clone(), run.id.clone());

    let body = json!({
        "success": true,
        "message": "Training started in the background. This may take some time.",
        "datasetSize": counts,
        "runId": run.id,
    });
    Ok(Json(body).into_response())
}

/// Run training on a blocking worker and record the outcome on the job
fn spawn_training(state: SharedState, run_id: String) {
    tokio::spawn(async move {
        state.jobs.mark_running(&run_id).await;

        let worker = state.clone();
        let worker_run_id = run_id.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let dataset_dir = worker.config.workspace.dataset_dir();
            let device = default_device();
            train_model_with::<TrainingBackend, _>(
                &dataset_dir,
                &worker.config.training,
                &worker.store,
                &device,
                |metrics| worker.jobs.record_epoch_blocking(&worker_run_id, metrics),
            )
        })
        .await;

        let outcome = match outcome {
            Ok(Ok(report)) => {
                info!(
                    "Training run {} completed in {:.1}s",
                    run_id, report.duration_secs
                );
                Ok(report)
            }
            Ok(Err(e)) => {
                error!("Training run {} failed: {}", run_id, e);
                Err(e.to_string())
            }
            Err(e) => {
                error!("Training run {} worker panicked: {}", run_id, e);
                Err("training worker stopped unexpectedly".to_string())
            }
        };
        state.jobs.finish(&run_id, outcome).await;
    });
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingHistoryResponse {
    pub success: bool,
    pub current: Option<TrainingRun>,
    pub history: Vec<TrainingRun>,
}

/// GET /api/dataset/train/history - Current run and earlier finished runs
pub async fn training_history(State(state): State<SharedState>) -> Json<TrainingHistoryResponse> {
    Json(TrainingHistoryResponse {
        success: true,
        current: state.jobs.current().await,
        history: state.jobs.history().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    pub category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
    pub deleted_count: usize,
}

/// POST /api/dataset/clear - Delete every image of one category
pub async fn clear_category(
    State(state): State<SharedState>,
    request: Option<Json<ClearRequest>>,
) -> ApiResult<Json<ClearResponse>> {
    let category: Category = request
        .and_then(|Json(req)| req.category)
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid category. Must be 'yes' or 'no'."))?;

    let deleted = run_blocking("Failed to clear the dataset category", move || {
        state.dataset.clear(category)
    })
    .await?;

    let message = if deleted > 0 {
        format!(
            "Successfully cleared {} images from the {} category",
            deleted, category
        )
    } else {
        format!(
            "No images to clear. The {} category is already empty.",
            category
        )
    };

    Ok(Json(ClearResponse {
        success: true,
        message,
        deleted_count: deleted,
    }))
}

/// POST /api/dataset/download-from-kaggle - Manual download instructions
pub async fn download_from_kaggle() -> Json<serde_json::Value> {
    warn!("Kaggle download requested; only manual download is supported");
    Json(json!({
        "success": false,
        "message": KAGGLE_INSTRUCTIONS,
    }))
}
