//! MediaTransport - the capability set every generation backend provides.
//!
//! Two implementations exist: [`RestTransport`](super::RestTransport) calls the
//! generative language endpoints directly, [`SdkTransport`](super::SdkTransport)
//! speaks the wire dialect of the official client libraries. Both are chosen at
//! construction time through [`build_transport`] and are interchangeable for
//! every other component.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::ValueEnum;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GenAiError;
use super::rest::RestTransport;
use super::sdk::SdkTransport;
use super::types::{GeneratedImage, GenerationRequest, MediaReference, Operation};

/// Default base URL for the generative language API.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default timeout for HTTP requests (120 seconds; image calls are slow).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on the buffer reserved from a `Content-Length` header.
const MAX_PREALLOCATION: usize = 8 * 1024 * 1024;

/// The remote actions a generation backend must support.
///
/// Every method performs at most one logical round trip and never mutates
/// previously returned values.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Generate a still image synchronously.
    ///
    /// # Errors
    ///
    /// `GenAiError::Transport` on a non-success status, `GenAiError::EmptyResult`
    /// when no candidate carries image bytes.
    async fn generate_image(&self, prompt: &str, model: &str) -> Result<GeneratedImage, GenAiError>;

    /// Submit a video generation job and return its operation handle.
    ///
    /// # Errors
    ///
    /// `GenAiError::Transport` on a non-success status,
    /// `GenAiError::MalformedResponse` when the reply has no operation name.
    async fn submit_video_job(&self, request: &GenerationRequest) -> Result<Operation, GenAiError>;

    /// Fetch the current state of a submitted operation. Idempotent.
    async fn fetch_status(&self, operation: &str) -> Result<Operation, GenAiError>;

    /// Resolve a media reference into raw bytes.
    ///
    /// # Errors
    ///
    /// `GenAiError::Transport` if the remote fetch fails,
    /// `GenAiError::UnresolvedReference` if the reference is empty.
    async fn fetch_bytes(&self, reference: &MediaReference) -> Result<Vec<u8>, GenAiError>;
}

#[async_trait]
impl<T: MediaTransport + ?Sized> MediaTransport for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn generate_image(&self, prompt: &str, model: &str) -> Result<GeneratedImage, GenAiError> {
        (**self).generate_image(prompt, model).await
    }

    async fn submit_video_job(&self, request: &GenerationRequest) -> Result<Operation, GenAiError> {
        (**self).submit_video_job(request).await
    }

    async fn fetch_status(&self, operation: &str) -> Result<Operation, GenAiError> {
        (**self).fetch_status(operation).await
    }

    async fn fetch_bytes(&self, reference: &MediaReference) -> Result<Vec<u8>, GenAiError> {
        (**self).fetch_bytes(reference).await
    }
}

/// Which transport implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Direct endpoint calls with the key as a query parameter.
    #[default]
    Rest,
    /// Client-library style calls with header authentication.
    Sdk,
}

/// Everything needed to construct a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub api_key: String,
    pub base_url: String,
    pub kind: TransportKind,
}

/// Construct the transport selected by `config.kind`.
///
/// # Errors
///
/// Returns `GenAiError::MissingApiKey` if the key is empty, or
/// `GenAiError::Http` if the HTTP client cannot be built.
pub fn build_transport(config: &TransportConfig) -> Result<Box<dyn MediaTransport>, GenAiError> {
    let transport: Box<dyn MediaTransport> = match config.kind {
        TransportKind::Rest => Box::new(RestTransport::with_base_url(
            config.api_key.clone(),
            config.base_url.clone(),
        )?),
        TransportKind::Sdk => Box::new(SdkTransport::with_base_url(
            config.api_key.clone(),
            config.base_url.clone(),
        )?),
    };
    log::debug!("Using {} transport against {}", transport.name(), config.base_url);
    Ok(transport)
}

/// HTTP plumbing shared by both transports.
pub(crate) struct HttpCore {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpCore {
    pub(crate) fn new(api_key: String, base_url: String) -> Result<Self, GenAiError> {
        if api_key.is_empty() {
            return Err(GenAiError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// `{base_url}/{path}`
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Endpoint for a model method, e.g. `models/veo:predictLongRunning`.
    pub(crate) fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        self.url(&format!("{}:{}", model_path, method))
    }

    /// Status endpoint for an operation. Fully qualified names
    /// (`models/x/operations/y`) are used as-is.
    pub(crate) fn operation_url(&self, operation: &str) -> String {
        if operation.contains('/') {
            self.url(operation)
        } else {
            self.url(&format!("operations/{}", operation))
        }
    }

    /// Media download URL for a file id (`files/abc` or `abc`).
    pub(crate) fn file_media_url(&self, file_id: &str, suffix: &str) -> Result<reqwest::Url, GenAiError> {
        let id = file_id.trim().trim_start_matches("files/");
        if id.is_empty() {
            return Err(GenAiError::UnresolvedReference(format!(
                "file id '{}' is empty",
                file_id
            )));
        }

        let invalid = |reason: String| GenAiError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base URL cannot have path segments".to_string()))?
            .pop_if_empty()
            .push("files")
            .push(&format!("{}{}", id, suffix));
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    /// Whether `uri` points at the configured API host.
    pub(crate) fn is_api_host(&self, uri: &str) -> bool {
        match (reqwest::Url::parse(uri), reqwest::Url::parse(&self.base_url)) {
            (Ok(target), Ok(base)) => {
                target.host_str() == base.host_str() && target.port_or_known_default() == base.port_or_known_default()
            }
            _ => false,
        }
    }

    /// Send a request and parse a JSON body out of a successful response.
    pub(crate) async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value, GenAiError> {
        let response = ensure_success(request.send().await?).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| GenAiError::MalformedResponse(format!("response is not valid JSON: {}", e)))
    }

    /// Send a request and collect the body of a successful response.
    pub(crate) async fn send_for_bytes(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, GenAiError> {
        let response = ensure_success(request.send().await?).await?;
        let mut bytes = Vec::with_capacity(preallocation(response.content_length()));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        log::debug!("Fetched {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Capacity to reserve for a body of the advertised length.
fn preallocation(content_length: Option<u64>) -> usize {
    content_length
        .map_or(0, |len| usize::try_from(len).unwrap_or(usize::MAX))
        .min(MAX_PREALLOCATION)
}

/// Map a non-success response to `GenAiError::Transport`.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GenAiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(GenAiError::Transport {
        status: status.as_u16(),
        body,
    })
}

/// Reject references that carry nothing to fetch.
pub(crate) fn check_reference(reference: &MediaReference) -> Result<(), GenAiError> {
    let problem = match reference {
        MediaReference::DirectUri(uri) if uri.trim().is_empty() => "direct URI is empty",
        MediaReference::FileId(id) if id.trim().is_empty() => "file id is empty",
        MediaReference::InlineBytes(bytes) if bytes.is_empty() => "inline bytes are empty",
        _ => return Ok(()),
    };
    Err(GenAiError::UnresolvedReference(problem.to_string()))
}

/// Decode a base64 payload field.
pub(crate) fn decode_base64(data: &str, field: &str) -> Result<Vec<u8>, GenAiError> {
    BASE64
        .decode(data.trim().as_bytes())
        .map_err(|e| GenAiError::MalformedResponse(format!("'{}' is not valid base64: {}", field, e)))
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Extract the first inline image from a `generateContent` response.
///
/// Every candidate and every part is scanned; the first part carrying both
/// a MIME type and non-empty data wins.
pub(crate) fn first_inline_image(payload: &Value) -> Result<GeneratedImage, GenAiError> {
    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if candidates.is_empty() {
        return Err(GenAiError::EmptyResult(
            "no candidates returned from image generation".to_string(),
        ));
    }

    let parts = candidates.iter().flat_map(|candidate| {
        candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    });

    for part in parts {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        if mime_type.is_empty() || data.is_empty() {
            continue;
        }
        return Ok(GeneratedImage {
            bytes: decode_base64(data, "inlineData.data")?,
            mime_type: mime_type.to_string(),
        });
    }

    Err(GenAiError::EmptyResult(
        "no inline image found in response".to_string(),
    ))
}
