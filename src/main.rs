//! tumorscan CLI
//!
//! Offline entry point to the same pipeline the server exposes: train on the
//! dataset folders, analyze a scan, inspect or clear the dataset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, Level};

use tumorscan::backend::backend_name;
use tumorscan::uploads::{unique_file_name, validated_extension};
use tumorscan::utils::logging::{init_logging, LogConfig};
use tumorscan::utils::{format_duration, format_percent};
use tumorscan::{train_model, AppConfig, Category, ModelStore, TumorDataset, TumorDetector};

/// Brain MRI tumor classification
#[derive(Parser, Debug)]
#[command(name = "tumorscan")]
#[command(version)]
#[command(about = "Brain MRI tumor classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Maximum log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[arg(long, env = "TUMORSCAN_LOG_LEVEL")]
    log_level: Option<Level>,

    /// Workspace root holding model/, dataset/ and uploads/
    #[arg(long, env = "TUMORSCAN_ROOT", default_value = ".")]
    root: PathBuf,

    /// JSON configuration file (overrides --root)
    #[arg(short, long, env = "TUMORSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a fresh model on the dataset folders
    Train {
        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Random seed for the split and shuffling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Analyze a single scan
    Infer {
        /// Path to the input image
        #[arg(short, long)]
        input: PathBuf,

        /// Print the result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show dataset counts and model state
    Status,

    /// Delete every image of one category
    Clear {
        /// Category to clear (`yes` or `no`)
        category: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
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

    match cli.command {
        Commands::Train {
            epochs,
            batch_size,
            learning_rate,
            seed,
        } => {
            let mut training = config.training.clone();
            if let Some(epochs) = epochs {
                training.epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                training.batch_size = batch_size;
            }
            if let Some(learning_rate) = learning_rate {
                training.learning_rate = learning_rate;
            }
            if let Some(seed) = seed {
                training.seed = seed;
            }
            cmd_train(&config, &training)?;
        }

        Commands::Infer { input, json } => {
            cmd_infer(&config, &input, json)?;
        }

        Commands::Status => {
            cmd_status(&config)?;
        }

        Commands::Clear { category } => {
            let category: Category = category.parse()?;
            cmd_clear(&config, category)?;
        }
    }

    Ok(())
}

fn cmd_train(config: &AppConfig, training: &tumorscan::TrainingConfig) -> Result<()> {
    let dataset_dir = config.workspace.dataset_dir();

    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Dataset:       {}", dataset_dir.display());
    println!("  Epochs:        {}", training.epochs);
    println!("  Batch size:    {}", training.batch_size);
    println!("  Learning rate: {}", training.learning_rate);
    println!("  Backend:       {}", backend_name());
    println!();

    let store = ModelStore::new(config.workspace.model_dir());
    let report = train_model(&dataset_dir, training, &store)?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!(
        "  Samples: {} train, {} validation ({} skipped)",
        report.train_samples, report.validation_samples, report.skipped
    );
    if let Some(last) = report.final_metrics() {
        println!("  Final loss:     {:.4}", last.loss);
        println!("  Final accuracy: {}", format_percent(last.accuracy));
        if let Some(val) = last.val_accuracy {
            println!("  Val accuracy:   {}", format_percent(val));
        }
    }
    println!("  Duration: {}", format_duration(report.duration_secs));
    println!("  Model:    {}", store.artifact().weights_path().display());
    Ok(())
}

fn cmd_infer(config: &AppConfig, input: &Path, json: bool) -> Result<()> {
    info!("Running inference on {:?}", input);

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("Not a file: {}", input.display()))?;
    let len = std::fs::metadata(input)
        .with_context(|| format!("Input not found: {}", input.display()))?
        .len() as usize;
    let output_name = unique_file_name("cli", &validated_extension(&name, len)?);

    let store = Arc::new(ModelStore::new(config.workspace.model_dir()));
    let detector = TumorDetector::new(
        store,
        config.workspace.processed_dir(),
        config.inference.clone(),
    );
    let result = detector.analyze(input, &output_name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let verdict = if result.is_positive() {
        "Tumor detected".red().bold()
    } else {
        "No tumor detected".green().bold()
    };
    println!("{}", "Result:".cyan().bold());
    println!("  {}", verdict);
    println!("  Confidence: {}", format_percent(result.confidence as f64));
    println!(
        "  Processed:  {}",
        config.workspace.processed_dir().join(&output_name).display()
    );
    if let Some(warning) = &result.warning_message {
        println!();
        println!("{}", warning.yellow());
    }
    Ok(())
}

fn cmd_status(config: &AppConfig) -> Result<()> {
    let dataset = TumorDataset::new(config.workspace.dataset_dir());
    let counts = dataset.counts()?;
    let store = ModelStore::new(config.workspace.model_dir());
    let info = store.artifact_info();

    println!("{}", "Dataset:".cyan().bold());
    println!("  yes:   {}", counts.yes);
    println!("  no:    {}", counts.no);
    println!("  total: {}", counts.total);
    let ready = counts.ready_for_training(config.min_images_per_category);
    println!(
        "  Ready for training: {}",
        if ready { "yes".green() } else { "no".yellow() }
    );
    println!();

    println!("{}", "Model:".cyan().bold());
    match info.last_modified {
        Some(modified) => {
            println!("  Path:          {}", store.artifact().weights_path().display());
            println!("  Last modified: {}", modified.to_rfc3339());
            if info.placeholder == Some(true) {
                println!("  {}", "Untrained placeholder".yellow());
            }
        }
        None => println!("  {}", "No model yet (a placeholder is created on first use)".yellow()),
    }
    Ok(())
}

fn cmd_clear(config: &AppConfig, category: Category) -> Result<()> {
    let dataset = TumorDataset::new(config.workspace.dataset_dir());
    let deleted = dataset.clear(category)?;
    println!(
        "{} Deleted {} images from '{}'",
        "Done:".green(),
        deleted,
        category
    );
    Ok(())
}
