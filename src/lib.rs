//! Rendermill HTML-to-PDF Conversion Worker Library
//!
//! This library provides the core of an HTML-to-PDF conversion service:
//! a bounded job dispatcher with a fixed worker pool, cancellable external
//! render-process execution, and a primary/secondary backend fallback with
//! single-retry semantics.
//!
//! ## Module Overview
//!
//! - `config`: environment-based service configuration
//! - `convert`: the `Converter` capability plus local CLI and remote API backends
//! - `error`: the conversion error taxonomy
//! - `exec`: cancellable external render-command execution
//! - `fallback`: primary-then-secondary attempt orchestration
//! - `job`: work units with single-fire result signaling and cancellation
//! - `queue`: bounded work queue and fixed worker pool
//! - `source`: conversion sources (remote URL or staged local file)
//! - `telemetry`: OpenTelemetry integration, metrics, and error reporting
//! - `upload`: object-storage upload boundary
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rendermill::{
//!     convert::{CliConverter, RenderArgs},
//!     fallback::{FallbackController, FallbackPolicy, SecondaryBackend},
//!     queue::Dispatcher,
//!     source::ConversionSource,
//!     telemetry::{Metrics, TracingReporter},
//!     upload::NullUploader,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let metrics = Arc::new(Metrics::new());
//!     let dispatcher = Arc::new(Dispatcher::new(
//!         32,
//!         4,
//!         Arc::new(NullUploader),
//!         metrics.clone(),
//!     ));
//!     let controller = FallbackController::new(
//!         dispatcher,
//!         FallbackPolicy::default(),
//!         SecondaryBackend::default(),
//!         metrics,
//!         Arc::new(TracingReporter),
//!     );
//!
//!     let source = Arc::new(ConversionSource::from_url("https://example.com", None)?);
//!     let primary = Arc::new(CliConverter::new("htmlrender -S", RenderArgs::default()));
//!     let _pdf = controller
//!         .run(primary, source, None, CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod exec;
pub mod fallback;
pub mod job;
pub mod queue;
pub mod source;
pub mod telemetry;
pub mod upload;
