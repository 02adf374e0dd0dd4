//! Mizuchi MPU - concurrent S3 multipart uploader
//!
//! Uploads one local file to S3 as a multipart upload and prints a JSON
//! summary of the committed object.

use anyhow::Context;
use clap::Parser;
use mizuchi_mpu::config::{AuthModeConfig, Config};
use mizuchi_mpu::s3::S3Client;
use mizuchi_mpu::upload::{CoordinatorConfig, FileSource, UploadCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Mizuchi MPU - S3 multipart uploader with bounded concurrency
#[derive(Parser, Debug)]
#[command(name = "mizuchi-mpu")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Local file to upload
    #[arg(short, long)]
    file: PathBuf,

    /// Destination object key
    #[arg(short, long)]
    key: String,

    /// Part size in bytes (overrides upload.part_size)
    #[arg(long)]
    part_size: Option<u64>,

    /// Parts in flight at once (overrides upload.concurrency)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Upload parts through presigned URLs
    #[arg(long)]
    presigned: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    print_metrics: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(part_size) = self.part_size {
            config.upload.part_size = part_size;
        }
        if let Some(concurrency) = self.concurrency {
            config.upload.concurrency = concurrency;
        }
        if self.presigned {
            config.upload.auth_mode = AuthModeConfig::Presigned;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Mizuchi MPU v{}", mizuchi_mpu::VERSION);

    // Load configuration
    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply_overrides(&mut config);
    config.validate()?;
    info!("Loaded configuration from {:?}", args.config);

    let client = S3Client::from_config(&config)?;
    let coordinator =
        UploadCoordinator::new(Arc::new(client), CoordinatorConfig::from_config(&config));

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling upload");
            cancel.cancel();
        }
    });

    let source = FileSource::open(&args.file)
        .await
        .with_context(|| format!("opening {}", args.file.display()))?;

    let result = coordinator.upload(&args.key, Arc::new(source)).await;

    if args.print_metrics {
        eprint!("{}", mizuchi_mpu::metrics::gather_text()?);
    }

    let outcome = result?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
