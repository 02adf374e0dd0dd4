//! Mizuchi MPU Library
//!
//! Concurrent S3 multipart uploads with bounded parallelism and guaranteed
//! session cleanup.
//!
//! # Features
//!
//! - **Bounded Pool**: Part count and concurrency are independent
//! - **Ordered Commit**: The completion manifest is sorted by part number,
//!   never by arrival order
//! - **No Orphans**: Every session that was opened ends in a commit or an abort
//! - **SigV4**: Signed requests or presigned part URLs
//! - **Retry**: Transient part failures are retried with backoff
//!
//! # Example
//!
//! ```no_run
//! use mizuchi_mpu::{config::Config, s3::S3Client};
//! use mizuchi_mpu::upload::{CoordinatorConfig, FileSource, UploadCoordinator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let client = S3Client::from_config(&config)?;
//!     let coordinator =
//!         UploadCoordinator::new(Arc::new(client), CoordinatorConfig::from_config(&config));
//!
//!     let source = FileSource::open("backup.tar").await?;
//!     let outcome = coordinator.upload("backups/backup.tar", Arc::new(source)).await?;
//!     println!("{} parts, etag {:?}", outcome.parts, outcome.etag);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod s3;
pub mod signer;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use s3::{MultipartStore, S3Client};
pub use upload::{UploadCoordinator, UploadError, UploadOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
