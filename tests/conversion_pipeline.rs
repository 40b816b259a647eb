//! Integration tests for the conversion pipeline: dispatcher, worker pool,
//! and fallback controller driven end to end with stub backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use rendermill::convert::Converter;
use rendermill::error::ConvertError;
use rendermill::fallback::{Completed, FallbackController, FallbackPolicy};
use rendermill::queue::Dispatcher;
use rendermill::source::ConversionSource;
use rendermill::telemetry::{ErrorReporter, Metrics, TracingReporter};
use rendermill::upload::{NullUploader, UploadError, UploadTarget, Uploader};

struct StubConverter {
    payload: &'static [u8],
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Converter for StubConverter {
    async fn convert(
        &self,
        _source: &ConversionSource,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.to_vec())
    }
}

struct FailingConverter {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Converter for FailingConverter {
    async fn convert(
        &self,
        _source: &ConversionSource,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ConvertError::Backend("primary backend down".into()))
    }
}

/// Captures uploaded payloads so tests can assert on completed side
/// effects.
struct RecordingUploader {
    uploads: Arc<AtomicUsize>,
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, bytes: &[u8], target: &UploadTarget) -> Result<(), UploadError> {
        assert_eq!(bytes, b"PDF-OK");
        assert_eq!(target.bucket, "converted-docs");
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RejectingUploader;

#[async_trait]
impl Uploader for RejectingUploader {
    async fn upload(&self, _bytes: &[u8], _target: &UploadTarget) -> Result<(), UploadError> {
        Err(UploadError("access denied".into()))
    }
}

fn dispatcher_with(uploader: Arc<dyn Uploader>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(8, 2, uploader, Arc::new(Metrics::new())))
}

fn reporter() -> Arc<dyn ErrorReporter> {
    Arc::new(TracingReporter)
}

fn controller_with(
    dispatcher: Arc<Dispatcher>,
    policy: FallbackPolicy,
    secondary_payload: &'static [u8],
    secondary_calls: Arc<AtomicUsize>,
) -> FallbackController {
    FallbackController::with_secondary_factory(
        dispatcher,
        policy,
        move || -> Arc<dyn Converter> {
            Arc::new(StubConverter {
                payload: secondary_payload,
                calls: secondary_calls.clone(),
            })
        },
        Arc::new(Metrics::new()),
        reporter(),
    )
}

#[tokio::test]
async fn url_source_converts_to_raw_bytes_without_upload() {
    let primary_calls = Arc::new(AtomicUsize::new(0));
    let secondary_calls = Arc::new(AtomicUsize::new(0));
    let controller = controller_with(
        dispatcher_with(Arc::new(NullUploader)),
        FallbackPolicy::default(),
        b"PDF-FALLBACK",
        secondary_calls.clone(),
    );

    let source = Arc::new(ConversionSource::from_url("http://example.test/page", None).unwrap());
    let result = controller
        .run(
            Arc::new(StubConverter {
                payload: b"PDF-OK",
                calls: primary_calls.clone(),
            }),
            source,
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Completed::Pdf(b"PDF-OK".to_vec()));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_primary_reports_only_the_fallback_outcome() {
    let primary_calls = Arc::new(AtomicUsize::new(0));
    let secondary_calls = Arc::new(AtomicUsize::new(0));
    let controller = controller_with(
        dispatcher_with(Arc::new(NullUploader)),
        FallbackPolicy {
            enabled: true,
            retry_on_timeout: false,
        },
        b"PDF-FALLBACK",
        secondary_calls.clone(),
    );

    let source = Arc::new(ConversionSource::from_url("http://example.test/page", None).unwrap());
    let result = controller
        .run(
            Arc::new(FailingConverter {
                calls: primary_calls.clone(),
            }),
            source,
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Completed::Pdf(b"PDF-FALLBACK".to_vec()));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn staged_local_file_is_gone_after_success() {
    let primary_calls = Arc::new(AtomicUsize::new(0));
    let secondary_calls = Arc::new(AtomicUsize::new(0));
    let controller = controller_with(
        dispatcher_with(Arc::new(NullUploader)),
        FallbackPolicy::default(),
        b"PDF-FALLBACK",
        secondary_calls,
    );

    let source = Arc::new(ConversionSource::from_bytes(b"<html><p>hi</p></html>", None).unwrap());
    let path = source.uri.clone();
    assert!(std::path::Path::new(&path).exists());

    let result = controller
        .run(
            Arc::new(StubConverter {
                payload: b"PDF-OK",
                calls: primary_calls,
            }),
            source,
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Completed::Pdf(b"PDF-OK".to_vec()));
    assert!(!std::path::Path::new(&path).exists());
}

#[tokio::test]
async fn staged_local_file_is_gone_after_failure() {
    let primary_calls = Arc::new(AtomicUsize::new(0));
    let secondary_calls = Arc::new(AtomicUsize::new(0));
    let controller = controller_with(
        dispatcher_with(Arc::new(NullUploader)),
        FallbackPolicy::default(),
        b"PDF-FALLBACK",
        secondary_calls,
    );

    let source = Arc::new(ConversionSource::from_bytes(b"<html></html>", None).unwrap());
    let path = source.uri.clone();

    let err = controller
        .run(
            Arc::new(FailingConverter {
                calls: primary_calls,
            }),
            source,
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Backend(_)));
    assert!(!std::path::Path::new(&path).exists());
}

#[tokio::test]
async fn configured_upload_completes_before_the_uploaded_signal() {
    let uploads = Arc::new(AtomicUsize::new(0));
    let primary_calls = Arc::new(AtomicUsize::new(0));
    let secondary_calls = Arc::new(AtomicUsize::new(0));
    let controller = controller_with(
        dispatcher_with(Arc::new(RecordingUploader {
            uploads: uploads.clone(),
        })),
        FallbackPolicy::default(),
        b"PDF-FALLBACK",
        secondary_calls,
    );

    let source = Arc::new(ConversionSource::from_url("http://example.test/page", None).unwrap());
    let result = controller
        .run(
            Arc::new(StubConverter {
                payload: b"PDF-OK",
                calls: primary_calls,
            }),
            source,
            Some(UploadTarget {
                bucket: "converted-docs".into(),
                key: "page.pdf".into(),
                ..UploadTarget::default()
            }),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Completed::Uploaded);
    assert_eq!(uploads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upload_failure_is_terminal_even_with_fallback_enabled() {
    let primary_calls = Arc::new(AtomicUsize::new(0));
    let secondary_calls = Arc::new(AtomicUsize::new(0));
    let controller = controller_with(
        dispatcher_with(Arc::new(RejectingUploader)),
        FallbackPolicy {
            enabled: true,
            retry_on_timeout: true,
        },
        b"PDF-FALLBACK",
        secondary_calls.clone(),
    );

    let source = Arc::new(ConversionSource::from_url("http://example.test/page", None).unwrap());
    let err = controller
        .run(
            Arc::new(StubConverter {
                payload: b"PDF-OK",
                calls: primary_calls.clone(),
            }),
            source,
            Some(UploadTarget::default()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Upload(_)));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
}
