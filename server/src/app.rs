//! Router assembly

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tumorscan::uploads::{MAX_DATASET_FILES, MAX_UPLOAD_BYTES};

use crate::routes;
use crate::state::SharedState;

/// Multipart framing allowance on top of the file payloads
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the application router
pub fn build_router(state: SharedState) -> Router {
    let workspace = &state.config.workspace;
    let uploads_dir = workspace.uploads_dir();
    let dataset_dir = workspace.dataset_dir();

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Scans
        .route("/api/upload", post(routes::upload::upload_image))
        .route("/api/analyze", post(routes::analyze::analyze_image))

        // Dataset management
        .route("/api/dataset/upload", post(routes::dataset::upload_dataset))
        .route("/api/dataset/status", get(routes::dataset::dataset_status))
        .route("/api/dataset/train", post(routes::dataset::start_training))
        .route(
            "/api/dataset/train/history",
            get(routes::dataset::training_history),
        )
        .route("/api/dataset/clear", post(routes::dataset::clear_category))
        .route(
            "/api/dataset/download-from-kaggle",
            post(routes::dataset::download_from_kaggle),
        )

        // Static files
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .nest_service("/dataset", ServeDir::new(dataset_dir))

        // Add state
        .with_state(state)

        // Add middleware
        .layer(DefaultBodyLimit::max(
            MAX_DATASET_FILES * MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
