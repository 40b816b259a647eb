//! Work units and their single-fire result signaling.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::convert::Converter;
use crate::error::ConvertError;
use crate::source::ConversionSource;
use crate::upload::UploadTarget;

/// Terminal result of a job. Exactly one variant is delivered per job, and
/// only after its side effects (the upload, if any) have completed.
#[derive(Debug)]
pub enum JobOutcome {
    /// Conversion succeeded with no upload configured; carries the PDF.
    Converted(Vec<u8>),
    /// Conversion and upload both succeeded; the artifact lives in storage.
    Uploaded,
    /// Conversion or upload failed.
    Failed(ConvertError),
}

/// One in-flight conversion request as seen by the worker pool.
///
/// Jobs are never recycled: each submission builds a fresh job with a fresh
/// cancellation token and result channel.
pub struct Job {
    pub id: Uuid,
    pub converter: Arc<dyn Converter>,
    pub source: Arc<ConversionSource>,
    pub upload: Option<UploadTarget>,
    pub cancel: CancellationToken,
    pub created_at: DateTime<Utc>,
    outcome: oneshot::Sender<JobOutcome>,
}

impl Job {
    /// Builds the job plus the caller-side handle observing its outcome.
    pub fn new(
        converter: Arc<dyn Converter>,
        source: Arc<ConversionSource>,
        upload: Option<UploadTarget>,
    ) -> (Self, JobHandle) {
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let id = Uuid::new_v4();

        let job = Job {
            id,
            converter,
            source,
            upload,
            cancel: cancel.clone(),
            created_at: Utc::now(),
            outcome: tx,
        };
        let handle = JobHandle {
            id,
            cancel,
            outcome: rx,
            submitted_at: Instant::now(),
        };
        (job, handle)
    }

    /// Delivers the terminal outcome. Consuming the sender makes a second
    /// signal for the same job unrepresentable. A dropped handle (caller
    /// already gone) is not an error.
    pub fn finish(self, outcome: JobOutcome) {
        let _ = self.outcome.send(outcome);
    }
}

/// Caller-side view of a submitted job.
pub struct JobHandle {
    pub id: Uuid,
    pub submitted_at: Instant,
    cancel: CancellationToken,
    outcome: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// Requests cancellation of the in-flight job. Idempotent; cancelling a
    /// job that already delivered its outcome is a no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone of the job's cancellation token, for callers that need to
    /// cancel from a context that no longer holds the handle.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the job's single terminal outcome.
    pub async fn wait(self) -> JobOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            // The job was dropped without signaling; this only happens when
            // the dispatcher shuts down underneath the request.
            Err(_) => JobOutcome::Failed(ConvertError::Cancelled),
        }
    }
}
