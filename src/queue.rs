//! Bounded work queue and the fixed worker pool that drains it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use crate::convert::Converter;
use crate::job::{Job, JobHandle, JobOutcome};
use crate::source::ConversionSource;
use crate::telemetry::{self, Metrics};
use crate::upload::{UploadTarget, Uploader};

/// Snapshot of dispatcher health for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Jobs sitting in the queue, not yet picked up by a worker.
    pub queued: usize,
    /// Fixed queue capacity.
    pub capacity: usize,
    /// Fixed worker pool size.
    pub workers: usize,
    /// Workers currently executing a job.
    pub active: usize,
}

/// Process-wide dispatcher: a bounded queue drained by a fixed pool of
/// worker tasks.
///
/// Constructed once at startup and never resized; request handlers receive
/// it by reference. When the queue is full, [`Dispatcher::submit`] blocks
/// the caller rather than dropping or reordering work.
pub struct Dispatcher {
    tx: mpsc::Sender<Job>,
    workers: usize,
    active: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        queue_capacity: usize,
        workers: usize,
        uploader: Arc<dyn Uploader>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let active = Arc::new(AtomicUsize::new(0));

        for worker_id in 0..workers {
            let rx = rx.clone();
            let uploader = uploader.clone();
            let active = active.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, rx, uploader, active).await;
            });
        }

        info!(workers, queue_capacity, "dispatcher started");
        Self {
            tx,
            workers,
            active,
            metrics,
        }
    }

    /// Enqueues a job and returns the handle observing its outcome.
    pub async fn submit(
        &self,
        converter: Arc<dyn Converter>,
        source: Arc<ConversionSource>,
        upload: Option<UploadTarget>,
    ) -> JobHandle {
        let (job, handle) = Job::new(converter, source, upload);
        debug!(job_id = %job.id, uri = %job.source.actual_uri(), "submitting job");
        self.metrics.job_submitted();

        if self.tx.send(job).await.is_err() {
            // Workers only exit when the process shuts down; the dropped job
            // resolves the handle with a cancellation.
            error!("work queue is closed, dropping submission");
        }
        handle
    }

    /// Non-blocking health snapshot.
    pub fn stats(&self) -> DispatcherStats {
        let capacity = self.tx.max_capacity();
        DispatcherStats {
            queued: capacity - self.tx.capacity(),
            capacity,
            workers: self.workers,
            active: self.active.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    uploader: Arc<dyn Uploader>,
    active: Arc<AtomicUsize>,
) {
    debug!(worker_id, "worker started");
    loop {
        // Hold the lock only while waiting for the next job.
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            debug!(worker_id, "work queue closed, worker exiting");
            break;
        };

        active.fetch_add(1, Ordering::Relaxed);
        process_job(worker_id, job, uploader.as_ref()).await;
        active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Runs one job to its terminal signal: convert, then upload when a target
/// is configured. The outcome fires only after the upload has fully
/// completed.
async fn process_job(worker_id: usize, job: Job, uploader: &dyn Uploader) {
    let queue_wait_ms = (Utc::now() - job.created_at).num_milliseconds();
    debug!(
        worker_id,
        job_id = %job.id,
        uri = %job.source.actual_uri(),
        queue_wait_ms,
        "processing job"
    );

    let started = Instant::now();
    let result = job.converter.convert(&job.source, &job.cancel).await;

    let outcome = match result {
        Ok(bytes) => match &job.upload {
            Some(target) => match uploader.upload(&bytes, target).await {
                Ok(()) => JobOutcome::Uploaded,
                Err(e) => JobOutcome::Failed(e.into()),
            },
            None => JobOutcome::Converted(bytes),
        },
        Err(e) => JobOutcome::Failed(e),
    };

    let label = match &outcome {
        JobOutcome::Converted(_) => "converted",
        JobOutcome::Uploaded => "uploaded",
        JobOutcome::Failed(_) => "failed",
    };
    telemetry::record_job_span(
        job.id,
        job.source.actual_uri(),
        label,
        queue_wait_ms,
        started.elapsed().as_millis() as i64,
    );

    job.finish(outcome);
}
