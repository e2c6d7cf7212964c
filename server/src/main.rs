//! tumorscan HTTP server
//!
//! Scan upload and analysis, dataset management and background training
//! over a JSON API. Uploaded and processed images are served as static files.

mod app;
mod error;
mod jobs;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tumorscan::backend::backend_name;
use tumorscan::utils::logging::{init_logging, LogConfig};
use tumorscan::AppConfig;

use crate::state::AppState;

/// tumorscan server
#[derive(Parser, Debug)]
#[command(name = "tumorscan-server")]
#[command(version)]
#[command(about = "HTTP API for brain MRI tumor classification")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "TUMORSCAN_PORT", default_value = "5000")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Workspace root holding model/, dataset/ and uploads/
    #[arg(long, env = "TUMORSCAN_ROOT", default_value = ".")]
    root: PathBuf,

    /// JSON configuration file (overrides --root)
    #[arg(short, long, env = "TUMORSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Maximum log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[arg(long, env = "TUMORSCAN_LOG_LEVEL")]
    log_level: Option<Level>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::production()
    };
    if let Some(level) = cli.log_level {
        log_config = log_config.with_level(level);
    }
    let _ = init_logging(&log_config);

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::with_root(&cli.root),
    };
    config.validate()?;
    config.workspace.ensure_layout()?;

    info!("tumorscan server v{}", tumorscan::VERSION);
    info!("Configuration:");
    info!("  Workspace:   {:?}", config.workspace.root);
    info!("  Model dir:   {:?}", config.workspace.model_dir());
    info!("  Dataset dir: {:?}", config.workspace.dataset_dir());
    info!("  Uploads dir: {:?}", config.workspace.uploads_dir());
    info!("  Backend:     {}", backend_name());

    let state = Arc::new(AppState::new(config));
    let app = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
