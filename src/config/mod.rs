//! Configuration module for Mizuchi MPU
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! # Example
//!
//! ```yaml
//! s3:
//!   bucket: "my-bucket"
//!   region: "us-east-1"
//!   access_key: "${AWS_ACCESS_KEY_ID}"
//!   secret_key: "${AWS_SECRET_ACCESS_KEY}"
//! upload:
//!   part_size: 104857600   # 100 MiB
//!   concurrency: 8         # up to 800 MiB of part buffers
//!   empty_object: reject
//! retry:
//!   max_attempts: 3
//! ```

use crate::upload::EmptyObjectPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Smallest part S3 accepts (except for the last part)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Largest part S3 accepts
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Longest presigned URL lifetime SigV4 allows (7 days)
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub s3: S3Config,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        ConfigLoader::parse(content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError("s3.bucket cannot be empty".into()));
        }

        if self.s3.region.trim().is_empty() {
            return Err(ConfigError::ValidationError("s3.region cannot be empty".into()));
        }

        if let Some(ref endpoint) = self.s3.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid s3.endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.s3.access_key.is_some() != self.s3.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "s3.access_key and s3.secret_key must be set together".into(),
            ));
        }

        let upload = &self.upload;
        if upload.part_size < MIN_PART_SIZE || upload.part_size > MAX_PART_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "Invalid upload.part_size {}: must be between {} and {} bytes",
                upload.part_size, MIN_PART_SIZE, MAX_PART_SIZE
            )));
        }

        if upload.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "upload.concurrency must be at least 1".into(),
            ));
        }

        if upload.presigned()
            && (upload.presign_expiry_secs == 0
                || upload.presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS)
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid upload.presign_expiry_secs {}: must be between 1 and {}",
                upload.presign_expiry_secs, MAX_PRESIGN_EXPIRY_SECS
            )));
        }

        if upload.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "upload.connect_timeout_secs must be greater than 0".into(),
            ));
        }

        if upload.request_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "upload.request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::ValidationError(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }

        Ok(())
    }
}

/// S3 backend configuration
///
/// Credentials left out here are read from `AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Address the bucket as `{endpoint}/{bucket}` (MinIO and friends)
    #[serde(default)]
    pub path_style: bool,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

/// How part uploads are authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthModeConfig {
    #[default]
    Signed,
    Presigned,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_part_size")]
    pub part_size: u64,
    /// Parts in flight; each holds `part_size` bytes in memory
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Zero-length objects: `reject` or `single_empty_part`
    #[serde(default)]
    pub empty_object: EmptyObjectPolicy,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub auth_mode: AuthModeConfig,
    #[serde(default = "default_presign_expiry_secs")]
    pub presign_expiry_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl UploadConfig {
    pub fn presigned(&self) -> bool {
        self.auth_mode == AuthModeConfig::Presigned
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_size: default_part_size(),
            concurrency: default_concurrency(),
            empty_object: EmptyObjectPolicy::default(),
            fail_fast: false,
            auth_mode: AuthModeConfig::default(),
            presign_expiry_secs: default_presign_expiry_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

fn default_part_size() -> u64 {
    MAX_PART_SIZE
}

fn default_concurrency() -> usize {
    4
}

fn default_presign_expiry_secs() -> u64 {
    900 // 15 minutes
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Part transfer retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per part, including the first. 1 disables retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    10_000
}
