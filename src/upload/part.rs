//! Part uploader
//!
//! Transfers one planned segment: reads exactly its bytes from the source,
//! sends them as one UploadPart request and returns the part's ETag.

use super::manifest::PartResult;
use super::planner::PartSegment;
use super::retry::{RetryExhausted, RetryPolicy};
use super::source::PartSource;
use super::{UploadError, UploadSession};
use crate::metrics;
use crate::s3::MultipartStore;
use std::io;
use std::sync::Arc;
use std::time::Instant;

/// Uploads single parts against a store
#[derive(Clone)]
pub struct PartUploader {
    store: Arc<dyn MultipartStore>,
    source: Arc<dyn PartSource>,
    retry: RetryPolicy,
}

impl PartUploader {
    pub fn new(
        store: Arc<dyn MultipartStore>,
        source: Arc<dyn PartSource>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            source,
            retry,
        }
    }

    /// Upload `segment` under `session`
    #[tracing::instrument(
        name = "upload.part",
        skip(self, session, segment),
        fields(
            upload_id = %session.upload_id,
            part_number = segment.part_number,
            offset = segment.offset,
            bytes = segment.length,
            attempts = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        session: &UploadSession,
        segment: PartSegment,
    ) -> Result<PartResult, UploadError> {
        let part_number = segment.part_number;
        let start = Instant::now();

        let body = self
            .source
            .read_segment(&segment)
            .await
            .map_err(|source| UploadError::PartRead {
                part_number,
                source,
            })?;

        if body.len() as u64 != segment.length {
            return Err(UploadError::PartRead {
                part_number,
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read {} of {} bytes", body.len(), segment.length),
                ),
            });
        }

        let outcome = self
            .retry
            .run(|_| self.store.upload_part(session, part_number, body.clone()))
            .await;

        match outcome {
            Ok((etag, attempts)) => {
                let duration = start.elapsed();
                tracing::Span::current().record("attempts", attempts);
                metrics::record_part_success(segment.length, duration.as_secs_f64());

                Ok(PartResult {
                    part_number,
                    etag,
                    size: segment.length,
                    duration: Some(duration),
                    attempts,
                })
            }
            Err(RetryExhausted { error, attempts }) => {
                tracing::Span::current().record("attempts", attempts);
                metrics::record_part_failure();

                Err(UploadError::PartTransfer {
                    part_number,
                    attempts,
                    source: error,
                })
            }
        }
    }
}
