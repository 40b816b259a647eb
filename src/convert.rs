//! Conversion backends: the [`Converter`] capability, a local CLI renderer,
//! and a remote API renderer.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ConvertError;
use crate::exec;
use crate::source::ConversionSource;

/// A backend capable of turning a conversion source into PDF bytes.
///
/// Implementations hold static configuration only, so a single instance can
/// be shared across concurrent jobs.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(
        &self,
        source: &ConversionSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConvertError>;
}

/// Cookie injected into the render browser to impersonate the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Cookie {
    pub url: String,
    pub name: String,
    pub value: String,
}

/// Per-request options for the local render CLI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderArgs {
    pub page_size: Option<String>,
    pub delay_ms: Option<u32>,
    pub zoom: Option<f64>,
    pub cookie: Option<Cookie>,
    /// Aggressive content extraction for a clutter-free reading layout.
    pub aggressive: bool,
    /// Hold the render until the page reports completion via window.status.
    pub wait_for_status: bool,
}

/// Local renderer backed by an external CLI invocation.
#[derive(Debug, Clone)]
pub struct CliConverter {
    base_cmd: String,
    args: RenderArgs,
}

impl CliConverter {
    /// `base_cmd` is the static command prefix, e.g. `"htmlrender -S -T 120"`.
    pub fn new(base_cmd: impl Into<String>, args: RenderArgs) -> Self {
        Self {
            base_cmd: base_cmd.into(),
            args,
        }
    }

    /// Builds the full argument vector. Option order is fixed and the source
    /// URI is always the final positional argument.
    fn build_argv(&self, source: &ConversionSource) -> Vec<String> {
        let mut argv: Vec<String> = self
            .base_cmd
            .split_whitespace()
            .map(str::to_string)
            .collect();

        if self.args.aggressive {
            argv.push("-A".into());
        }
        if self.args.wait_for_status {
            argv.push("--wait-for-status".into());
        }
        if let Some(cookie) = &self.args.cookie {
            argv.extend([
                "--cookie-name".into(),
                cookie.name.clone(),
                "--cookie-value".into(),
                cookie.value.clone(),
                "--cookie-url".into(),
                cookie.url.clone(),
            ]);
        }
        if let Some(zoom) = self.args.zoom {
            argv.extend(["-Z".into(), zoom.to_string()]);
        }
        if let Some(delay) = self.args.delay_ms {
            argv.extend(["-D".into(), delay.to_string()]);
        }
        if let Some(page_size) = &self.args.page_size {
            argv.extend(["-P".into(), page_size.clone()]);
        }

        argv.push(source.uri.clone());
        argv
    }
}

#[async_trait]
impl Converter for CliConverter {
    async fn convert(
        &self,
        source: &ConversionSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConvertError> {
        info!(uri = %source.actual_uri(), "converting with local renderer");
        let argv = self.build_argv(source);
        exec::execute(&argv, cancel).await
    }
}

/// Request body sent to the remote API for URL sources.
#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    url: &'a str,
    ext: &'a str,
}

/// Remote renderer backed by a third-party conversion API.
///
/// One bounded HTTP request per convert call; non-success responses and
/// client timeouts map onto the conversion error taxonomy. No internal
/// retries; the fallback controller owns retry policy.
#[derive(Debug, Clone)]
pub struct RemoteConverter {
    api_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteConverter {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            api_url,
            api_key,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    async fn request(&self, source: &ConversionSource) -> Result<Vec<u8>, ConvertError> {
        let request = if source.is_local {
            let body = tokio::fs::read(&source.uri).await.map_err(|e| {
                ConvertError::Backend(format!("failed to read staged file: {e}"))
            })?;
            self.client
                .post(&self.api_url)
                .header("content-type", "text/html")
                .body(body)
        } else {
            self.client.post(&self.api_url).json(&RemoteRequest {
                url: &source.uri,
                ext: &source.extension,
            })
        };

        let response = request
            .header("x-api-key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConvertError::Backend(format!("{status}: {body}")));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ConvertError {
    if e.is_timeout() {
        ConvertError::Timeout
    } else {
        ConvertError::Backend(e.to_string())
    }
}

#[async_trait]
impl Converter for RemoteConverter {
    async fn convert(
        &self,
        source: &ConversionSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConvertError> {
        info!(uri = %source.actual_uri(), "converting with remote backend");
        tokio::select! {
            _ = cancel.cancelled() => Err(ConvertError::Cancelled),
            result = self.request(source) => result,
        }
    }
}
