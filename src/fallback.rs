//! Primary-then-secondary conversion with single-retry semantics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::convert::{Converter, RemoteConverter};
use crate::error::ConvertError;
use crate::job::{JobHandle, JobOutcome};
use crate::queue::Dispatcher;
use crate::source::ConversionSource;
use crate::telemetry::{ErrorReporter, Metrics};
use crate::upload::UploadTarget;

/// Retry policy for a caller request.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPolicy {
    /// Whether a failed primary attempt is handed to the secondary backend.
    pub enabled: bool,
    /// Whether a backend timeout counts as retryable.
    pub retry_on_timeout: bool,
}

/// Static configuration for building the secondary backend per request.
#[derive(Debug, Clone, Default)]
pub struct SecondaryBackend {
    pub api_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Terminal success of a caller request.
#[derive(Debug, PartialEq, Eq)]
pub enum Completed {
    /// The artifact was uploaded to object storage.
    Uploaded,
    /// The raw PDF bytes, returned when no upload was configured.
    Pdf(Vec<u8>),
}

type SecondaryFactory = dyn Fn() -> Arc<dyn Converter> + Send + Sync;

/// Drives each caller request through at most two attempts: the primary
/// backend, then (on a retryable failure, when enabled) a freshly built
/// secondary backend. Only the last attempt's error reaches the caller.
pub struct FallbackController {
    dispatcher: Arc<Dispatcher>,
    policy: FallbackPolicy,
    secondary: Arc<SecondaryFactory>,
    metrics: Arc<Metrics>,
    reporter: Arc<dyn ErrorReporter>,
}

impl FallbackController {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        policy: FallbackPolicy,
        secondary: SecondaryBackend,
        metrics: Arc<Metrics>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let factory = move || -> Arc<dyn Converter> {
            Arc::new(RemoteConverter::new(
                secondary.api_url.clone(),
                secondary.api_key.clone(),
                secondary.timeout,
            ))
        };
        Self::with_secondary_factory(dispatcher, policy, factory, metrics, reporter)
    }

    /// Constructor taking an arbitrary secondary backend factory.
    pub fn with_secondary_factory(
        dispatcher: Arc<Dispatcher>,
        policy: FallbackPolicy,
        secondary: impl Fn() -> Arc<dyn Converter> + Send + Sync + 'static,
        metrics: Arc<Metrics>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            dispatcher,
            policy,
            secondary: Arc::new(secondary),
            metrics,
            reporter,
        }
    }

    /// Runs one caller request to its terminal result.
    ///
    /// `disconnect` is the caller's abandonment signal; when it fires the
    /// outstanding work unit is cancelled and no retry happens. The staged
    /// source file, if any, is removed exactly once after the terminal
    /// result, whichever branch produced it.
    pub async fn run(
        &self,
        primary: Arc<dyn Converter>,
        source: Arc<ConversionSource>,
        upload: Option<UploadTarget>,
        disconnect: CancellationToken,
    ) -> Result<Completed, ConvertError> {
        let result = self
            .attempts(primary, source.clone(), upload, disconnect)
            .await;
        source.cleanup().await;
        result
    }

    async fn attempts(
        &self,
        primary: Arc<dyn Converter>,
        source: Arc<ConversionSource>,
        upload: Option<UploadTarget>,
        disconnect: CancellationToken,
    ) -> Result<Completed, ConvertError> {
        let started = Instant::now();

        let handle = self
            .dispatcher
            .submit(primary, source.clone(), upload.clone())
            .await;
        let err = match self.await_outcome(handle, &disconnect).await? {
            JobOutcome::Uploaded => {
                self.metrics.conversion_succeeded(elapsed_ms(started));
                return Ok(Completed::Uploaded);
            }
            JobOutcome::Converted(bytes) => {
                self.metrics.conversion_succeeded(elapsed_ms(started));
                return Ok(Completed::Pdf(bytes));
            }
            JobOutcome::Failed(err) => err,
        };

        self.observe_failure(&err, &source);

        if !(self.policy.enabled && err.is_retryable(self.policy.retry_on_timeout)) {
            self.metrics.conversion_failed(&err, elapsed_ms(started));
            return Err(err);
        }

        warn!(
            uri = %source.actual_uri(),
            error = %err,
            "primary backend failed, falling back to secondary"
        );
        self.metrics.fallback_attempted();

        // The first attempt has fully terminated (its outcome fired), so the
        // fresh work unit cannot overlap with it.
        let secondary = (self.secondary)();
        let handle = self.dispatcher.submit(secondary, source.clone(), upload).await;
        match self.await_outcome(handle, &disconnect).await? {
            JobOutcome::Uploaded => {
                self.metrics.conversion_succeeded(elapsed_ms(started));
                Ok(Completed::Uploaded)
            }
            JobOutcome::Converted(bytes) => {
                self.metrics.conversion_succeeded(elapsed_ms(started));
                Ok(Completed::Pdf(bytes))
            }
            JobOutcome::Failed(err) => {
                self.observe_failure(&err, &source);
                self.metrics.conversion_failed(&err, elapsed_ms(started));
                Err(err)
            }
        }
    }

    /// Awaits a work unit's single result signal, racing it against caller
    /// disconnect. Disconnect cancels the unit and stops observation.
    async fn await_outcome(
        &self,
        handle: JobHandle,
        disconnect: &CancellationToken,
    ) -> Result<JobOutcome, ConvertError> {
        let cancel = handle.cancellation_token();
        tokio::select! {
            _ = disconnect.cancelled() => {
                cancel.cancel();
                self.metrics.conversion_cancelled();
                Err(ConvertError::Cancelled)
            }
            outcome = handle.wait() => Ok(outcome),
        }
    }

    /// Non-timeout failures go to the error reporter with request context.
    fn observe_failure(&self, err: &ConvertError, source: &ConversionSource) {
        self.metrics.failure_observed(err);
        if err.is_timeout() {
            return;
        }
        let mut context = HashMap::new();
        context.insert("url", source.actual_uri().to_string());
        self.reporter.report(err, context);
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
