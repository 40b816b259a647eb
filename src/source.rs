//! Conversion source descriptors: a remote URL or a locally staged file.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;
use url::Url;

use crate::error::ConvertError;

/// Extension assumed when the caller does not name one.
pub const DEFAULT_EXTENSION: &str = "html";

/// What is being converted and how to clean it up afterwards.
///
/// A local source names a temp file staged from an uploaded document body.
/// That file must be removed exactly once after the final conversion
/// attempt, whichever way the request ends; [`ConversionSource::cleanup`]
/// enforces the exactly-once part.
#[derive(Debug)]
pub struct ConversionSource {
    pub uri: String,
    pub is_local: bool,
    pub extension: String,
    cleaned: AtomicBool,
}

impl ConversionSource {
    /// Builds a source for a remote document. Empty or unparseable URLs and
    /// non-HTTP schemes are rejected before any work unit exists.
    pub fn from_url(raw: &str, ext: Option<String>) -> Result<Self, ConvertError> {
        if raw.is_empty() {
            return Err(ConvertError::InvalidInput("no URL provided".into()));
        }
        let url = Url::parse(raw)
            .map_err(|e| ConvertError::InvalidInput(format!("bad URL {raw:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConvertError::InvalidInput(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }
        Ok(Self {
            uri: raw.to_string(),
            is_local: false,
            extension: ext.unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            cleaned: AtomicBool::new(false),
        })
    }

    /// Stages an uploaded document body to a temp file and builds a local
    /// source pointing at it. The file suffix carries the extension so the
    /// render CLI can sniff the input kind.
    pub fn from_bytes(body: &[u8], ext: Option<String>) -> Result<Self, ConvertError> {
        if body.is_empty() {
            return Err(ConvertError::InvalidInput("empty document body".into()));
        }
        let extension = ext.unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        let mut file = tempfile::Builder::new()
            .prefix("rendermill-")
            .suffix(&format!(".{extension}"))
            .tempfile()
            .map_err(|e| ConvertError::InvalidInput(format!("failed to stage document: {e}")))?;
        file.write_all(body)
            .map_err(|e| ConvertError::InvalidInput(format!("failed to stage document: {e}")))?;
        let (_, path) = file
            .keep()
            .map_err(|e| ConvertError::InvalidInput(format!("failed to stage document: {e}")))?;

        Ok(Self {
            uri: path.to_string_lossy().into_owned(),
            is_local: true,
            extension,
            cleaned: AtomicBool::new(false),
        })
    }

    /// Returns the URI to log for this source. Identical for both source
    /// kinds; call sites never branch on `is_local`.
    pub fn actual_uri(&self) -> &str {
        &self.uri
    }

    /// Deletes the staged file behind a local source. Only the first call
    /// removes anything; removal failures are logged, never propagated.
    pub async fn cleanup(&self) {
        if !self.is_local {
            return;
        }
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&self.uri).await {
            warn!(path = %self.uri, error = %e, "failed to remove staged source file");
        }
    }
}
