//! Upload coordinator
//!
//! Owns the lifecycle of one multipart upload:
//!
//! ```text
//! Idle -> SessionOpen -> PartsInFlight -> PartsCollected -> Committed
//!   \__________\_______________\________________\______-> Failed
//! ```
//!
//! Parts run on a bounded pool: a semaphore permit is taken before each
//! part is spawned, so at most `concurrency` parts hold a buffer at once.
//! Every dispatched part is awaited before the outcome is decided. Once a
//! session is open it always ends in exactly one commit or abort.

use super::manifest::{CompletionManifest, PartResult};
use super::part::PartUploader;
use super::planner::{EmptyObjectPolicy, PartPlanner, PartSegment};
use super::retry::RetryPolicy;
use super::source::PartSource;
use super::{UploadError, UploadSession};
use crate::config::Config;
use crate::metrics;
use crate::s3::{CompleteOutput, MultipartStore};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Default part size (5 GiB, the S3 maximum)
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Default number of parts in flight
///
/// Every part in flight is held in memory in full, so peak buffer use is
/// about `concurrency * part_size`: 20 GiB with both defaults. Lower the
/// part size for memory-constrained hosts.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub part_size: u64,
    /// Maximum parts transferred at the same time
    pub concurrency: usize,
    pub empty_object: EmptyObjectPolicy,
    /// Stop dispatching new parts after the first part failure
    pub fail_fast: bool,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            empty_object: EmptyObjectPolicy::default(),
            fail_fast: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            part_size: config.upload.part_size,
            concurrency: config.upload.concurrency,
            empty_object: config.upload.empty_object,
            fail_fast: config.upload.fail_fast,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

/// Lifecycle of one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    SessionOpen,
    PartsInFlight,
    PartsCollected,
    Committed,
    Failed,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Committed | UploadState::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: UploadState) -> bool {
        use UploadState::*;
        match (self, next) {
            (Idle, SessionOpen)
            | (SessionOpen, PartsInFlight)
            | (PartsInFlight, PartsCollected)
            | (PartsCollected, Committed) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    fn advance(&mut self, next: UploadState) {
        debug_assert!(
            self.can_transition_to(next),
            "illegal upload transition {} -> {}",
            self,
            next
        );
        tracing::debug!(from = %self, to = %next, "Upload state transition");
        *self = next;
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadState::Idle => "idle",
            UploadState::SessionOpen => "session_open",
            UploadState::PartsInFlight => "parts_in_flight",
            UploadState::PartsCollected => "parts_collected",
            UploadState::Committed => "committed",
            UploadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a committed upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub key: String,
    pub bucket: String,
    pub upload_id: String,
    pub etag: Option<String>,
    pub location: Option<String>,
    pub parts: usize,
    pub bytes: u64,
    pub elapsed_secs: f64,
}

/// Guarantees an open session ends in a commit or an abort.
///
/// Dropping an armed guard (a panic, or the upload future being dropped)
/// spawns the abort on the current runtime.
pub struct SessionGuard {
    store: Arc<dyn MultipartStore>,
    session: UploadSession,
    armed: bool,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn MultipartStore>, session: UploadSession) -> Self {
        Self {
            store,
            session,
            armed: true,
        }
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Commit the manifest; the session is aborted if the commit fails
    pub async fn commit(
        mut self,
        manifest: &CompletionManifest,
    ) -> Result<CompleteOutput, UploadError> {
        self.armed = false;
        match self.store.complete(&self.session, manifest).await {
            Ok(output) => Ok(output),
            Err(source) => {
                abort_session(self.store.as_ref(), &self.session).await;
                Err(UploadError::Commit { source })
            }
        }
    }

    /// Abort the session. Failures are logged, not returned.
    pub async fn abort(mut self) {
        self.armed = false;
        abort_session(self.store.as_ref(), &self.session).await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    upload_id = %self.session.upload_id,
                    "Upload session dropped while open, aborting in background"
                );
                let store = self.store.clone();
                let session = self.session.clone();
                handle.spawn(async move {
                    abort_session(store.as_ref(), &session).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    upload_id = %self.session.upload_id,
                    key = %self.session.key,
                    "Upload session dropped outside a runtime and left open"
                );
            }
        }
    }
}

async fn abort_session(store: &dyn MultipartStore, session: &UploadSession) {
    match store.abort(session).await {
        Ok(()) => {
            tracing::info!(upload_id = %session.upload_id, key = %session.key, "Aborted multipart upload");
            metrics::record_abort(true);
        }
        Err(e) => {
            tracing::warn!(
                upload_id = %session.upload_id,
                key = %session.key,
                error = %e,
                "Failed to abort multipart upload, session may be left open"
            );
            metrics::record_abort(false);
        }
    }
}

/// Drives multipart uploads against a store
pub struct UploadCoordinator {
    store: Arc<dyn MultipartStore>,
    config: CoordinatorConfig,
    cancel: CancellationToken,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn MultipartStore>, config: CoordinatorConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels uploads started by this coordinator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Upload everything in `source` to `key`
    #[tracing::instrument(
        name = "upload.multipart",
        skip(self, key, source),
        fields(
            key = %key,
            bytes = source.len(),
            upload_id = tracing::field::Empty,
            parts = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        key: &str,
        source: Arc<dyn PartSource>,
    ) -> Result<UploadOutcome, UploadError> {
        let started = Instant::now();
        let mut state = UploadState::Idle;

        let result = self.run(key, source, &mut state, started).await;

        match &result {
            Ok(outcome) => {
                metrics::record_multipart_upload_success(outcome.parts, outcome.bytes);
                tracing::info!(
                    upload_id = %outcome.upload_id,
                    parts = outcome.parts,
                    bytes = outcome.bytes,
                    elapsed_secs = outcome.elapsed_secs,
                    "Multipart upload committed"
                );
            }
            Err(e) => {
                state.advance(UploadState::Failed);
                metrics::record_multipart_upload_failure(e.phase().label());
            }
        }

        result
    }

    async fn run(
        &self,
        key: &str,
        source: Arc<dyn PartSource>,
        state: &mut UploadState,
        started: Instant,
    ) -> Result<UploadOutcome, UploadError> {
        // Planned before the session opens so a bad plan leaves nothing behind
        let segments = PartPlanner::new(self.config.part_size, self.config.empty_object)
            .plan(source.len())?;
        let expected = segments.len();
        tracing::Span::current().record("parts", expected);

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled {
                completed: 0,
                expected,
            });
        }

        let session = self.store.initiate(key).await.map_err(|source| {
            UploadError::SessionInitiation {
                key: key.to_string(),
                source,
            }
        })?;
        tracing::Span::current().record("upload_id", session.upload_id.as_str());
        state.advance(UploadState::SessionOpen);

        let guard = SessionGuard::new(self.store.clone(), session);

        state.advance(UploadState::PartsInFlight);
        let results = match self.transfer_parts(guard.session(), segments, source).await {
            Ok(results) => results,
            Err(e) => {
                guard.abort().await;
                return Err(e);
            }
        };
        state.advance(UploadState::PartsCollected);

        let bytes = results.iter().map(|r| r.size).sum();
        let manifest = match CompletionManifest::from_results(results, expected) {
            Ok(manifest) => manifest,
            Err(e) => {
                guard.abort().await;
                return Err(e.into());
            }
        };

        let session = guard.session().clone();
        let output = guard.commit(&manifest).await?;
        state.advance(UploadState::Committed);

        Ok(UploadOutcome {
            key: session.key,
            bucket: session.bucket,
            upload_id: session.upload_id,
            etag: output.etag,
            location: output.location,
            parts: manifest.len(),
            bytes,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Run every segment through the worker pool and wait for all of them
    async fn transfer_parts(
        &self,
        session: &UploadSession,
        segments: Vec<PartSegment>,
        source: Arc<dyn PartSource>,
    ) -> Result<Vec<PartResult>, UploadError> {
        let expected = segments.len();
        let uploader = PartUploader::new(self.store.clone(), source, self.config.retry.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let dispatch = self.cancel.child_token();
        let (tx, mut rx) = mpsc::channel::<PartResult>(expected.max(1));
        let mut tasks = JoinSet::new();

        for segment in segments {
            let permit = tokio::select! {
                biased;
                _ = dispatch.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|e| UploadError::Join(e.to_string()))?
                }
            };

            let uploader = uploader.clone();
            let session = session.clone();
            let tx = tx.clone();
            let dispatch = dispatch.clone();
            let fail_fast = self.config.fail_fast;

            tracing::debug!(part_number = segment.part_number, "Dispatching part");
            tasks.spawn(
                async move {
                    let _permit = permit;
                    let part_number = segment.part_number;
                    match uploader.upload(&session, segment).await {
                        Ok(result) => tx.send(result).await.map_err(|_| {
                            UploadError::Join(format!("result channel closed for part {}", part_number))
                        }),
                        Err(e) => {
                            if fail_fast {
                                dispatch.cancel();
                            }
                            Err(e)
                        }
                    }
                }
                .in_current_span(),
            );
        }
        drop(tx);

        let dispatched = tasks.len();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(e) => failures.push(UploadError::Join(e.to_string())),
            }
        }

        let mut results = Vec::with_capacity(expected);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        tracing::debug!(
            expected,
            dispatched,
            completed = results.len(),
            failed = failures.len(),
            "All dispatched parts finished"
        );

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled {
                completed: results.len(),
                expected,
            });
        }

        if !failures.is_empty() || results.len() != expected {
            failures.sort_by_key(|e| e.part_number().unwrap_or(u32::MAX));
            let failed = failures.iter().filter_map(UploadError::part_number).collect();
            return Err(UploadError::PartialUpload {
                expected,
                completed: results.len(),
                failed,
                failures,
            });
        }

        Ok(results)
    }
}
