//! Upload module
//!
//! Orchestrates S3 multipart uploads: planning parts, transferring them
//! through a bounded worker pool, and committing the ordered manifest.

use crate::s3::S3ClientError;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub mod coordinator;
pub mod manifest;
pub mod part;
pub mod planner;
pub mod retry;
pub mod source;

pub use coordinator::{
    CoordinatorConfig, SessionGuard, UploadCoordinator, UploadOutcome, UploadState,
};
pub use manifest::{CompletedPart, CompletionManifest, ManifestError, PartResult};
pub use part::PartUploader;
pub use planner::{EmptyObjectPolicy, PartPlanner, PartSegment, PlanError, MAX_PARTS};
pub use retry::{RetryExhausted, RetryPolicy};
pub use source::{BytesSource, FileSource, PartSource};

/// One open multipart transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub upload_id: String,
    pub key: String,
    pub bucket: String,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(
        upload_id: impl Into<String>,
        key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            upload_id: upload_id.into(),
            key: key.into(),
            bucket: bucket.into(),
            created_at: Utc::now(),
        }
    }
}

/// Where in the upload a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Plan,
    Initiate,
    Part(u32),
    Parts,
    Commit,
}

impl UploadPhase {
    /// Low-cardinality name for metric labels
    pub fn label(&self) -> &'static str {
        match self {
            UploadPhase::Plan => "plan",
            UploadPhase::Initiate => "initiate",
            UploadPhase::Part(_) | UploadPhase::Parts => "parts",
            UploadPhase::Commit => "commit",
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::Plan => write!(f, "plan"),
            UploadPhase::Initiate => write!(f, "initiate"),
            UploadPhase::Part(n) => write!(f, "part {}", n),
            UploadPhase::Parts => write!(f, "parts"),
            UploadPhase::Commit => write!(f, "commit"),
        }
    }
}

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("Initiate failed for key '{key}': {source}")]
    SessionInitiation {
        key: String,
        #[source]
        source: S3ClientError,
    },

    #[error("Part {part_number}: reading source failed: {source}")]
    PartRead {
        part_number: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Part {part_number}: transfer failed after {attempts} attempt(s): {source}")]
    PartTransfer {
        part_number: u32,
        attempts: u32,
        #[source]
        source: S3ClientError,
    },

    #[error(
        "Partial multipart upload: {completed} of {expected} parts completed, failed parts {failed:?}{}",
        .failures.first().map(|e| format!(" (first error: {})", e)).unwrap_or_default()
    )]
    PartialUpload {
        expected: usize,
        completed: usize,
        failed: Vec<u32>,
        failures: Vec<UploadError>,
    },

    #[error("Commit failed: {source}")]
    Commit {
        #[source]
        source: S3ClientError,
    },

    #[error("Invalid completion manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Upload cancelled after {completed} of {expected} parts")]
    Cancelled { completed: usize, expected: usize },

    #[error("Part worker failed: {0}")]
    Join(String),
}

impl UploadError {
    /// Phase the failure belongs to
    pub fn phase(&self) -> UploadPhase {
        match self {
            UploadError::Plan(_) => UploadPhase::Plan,
            UploadError::SessionInitiation { .. } => UploadPhase::Initiate,
            UploadError::PartRead { part_number, .. }
            | UploadError::PartTransfer { part_number, .. } => UploadPhase::Part(*part_number),
            UploadError::PartialUpload { .. }
            | UploadError::Cancelled { .. }
            | UploadError::Join(_) => UploadPhase::Parts,
            UploadError::Commit { .. } | UploadError::Manifest(_) => UploadPhase::Commit,
        }
    }

    /// Part the failure is about, if any
    pub fn part_number(&self) -> Option<u32> {
        match self.phase() {
            UploadPhase::Part(n) => Some(n),
            _ => None,
        }
    }

    /// Raw store response body, if the store answered
    pub fn response_body(&self) -> Option<&str> {
        match self {
            UploadError::SessionInitiation { source, .. }
            | UploadError::PartTransfer { source, .. }
            | UploadError::Commit { source } => source.response_body(),
            UploadError::PartialUpload { failures, .. } => {
                failures.iter().find_map(UploadError::response_body)
            }
            _ => None,
        }
    }
}
