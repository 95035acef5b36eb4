//! SdkTransport - the request dialect used by the official client libraries.
//!
//! Differs from [`RestTransport`](super::RestTransport) on the wire only:
//! header authentication and the `predict`/`predictLongRunning` endpoints.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::error::GenAiError;
use super::transport::{
    check_reference, decode_base64, encode_base64, first_inline_image, HttpCore, MediaTransport,
    DEFAULT_API_BASE_URL,
};
use super::types::{GeneratedImage, GenerationRequest, MediaReference, Operation};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Model families served through `:predict` instead of `:generateContent`.
const PREDICT_MODEL_PREFIXES: &[&str] = &["imagen"];

/// Transport speaking the client-library dialect.
pub struct SdkTransport {
    core: HttpCore,
}

impl SdkTransport {
    /// Create a transport against the public API.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError::MissingApiKey` if `api_key` is empty.
    pub fn with_api_key(api_key: String) -> Result<Self, GenAiError> {
        Self::with_base_url(api_key, DEFAULT_API_BASE_URL.to_string())
    }

    /// Create a transport against a custom base URL.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, GenAiError> {
        Ok(Self {
            core: HttpCore::new(api_key, base_url)?,
        })
    }

    pub fn api_key(&self) -> &str {
        self.core.api_key()
    }

    pub fn base_url(&self) -> &str {
        self.core.base_url()
    }

    fn post(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        self.core
            .client()
            .post(url)
            .header(API_KEY_HEADER, self.core.api_key())
            .json(body)
    }
}

fn uses_predict(model: &str) -> bool {
    let bare = model.trim().trim_start_matches("models/");
    PREDICT_MODEL_PREFIXES
        .iter()
        .any(|prefix| bare.starts_with(prefix))
}

fn predict_image_body(prompt: &str) -> Value {
    json!({
        "instances": [{"prompt": prompt}],
        "parameters": {"sampleCount": 1}
    })
}

fn content_image_body(prompt: &str) -> Value {
    json!({
        "contents": [{"role": "user", "parts": [{"text": prompt}]}]
    })
}

fn long_running_body(request: &GenerationRequest) -> Value {
    let mut instance = Map::new();
    instance.insert("prompt".to_string(), json!(request.prompt()));
    if let Some(image) = request.conditioning_image() {
        instance.insert(
            "image".to_string(),
            json!({
                "bytesBase64Encoded": encode_base64(&image.bytes),
                "mimeType": image.mime_type,
            }),
        );
    }

    let output = request.output_config();
    json!({
        "instances": [Value::Object(instance)],
        "parameters": {
            "durationSeconds": output.duration_seconds,
            "resolution": output.resolution,
            "aspectRatio": output.aspect_ratio,
        }
    })
}

/// Pick the first prediction carrying image bytes.
fn first_prediction_image(payload: &Value) -> Result<GeneratedImage, GenAiError> {
    let predictions = payload
        .get("predictions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for prediction in predictions {
        let data = prediction
            .get("bytesBase64Encoded")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = prediction
            .get("mimeType")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("image/png");
        return Ok(GeneratedImage {
            bytes: decode_base64(data, "bytesBase64Encoded")?,
            mime_type: mime_type.to_string(),
        });
    }

    Err(GenAiError::EmptyResult(
        "no image bytes returned from image generation".to_string(),
    ))
}

#[async_trait]
impl MediaTransport for SdkTransport {
    fn name(&self) -> &'static str {
        "sdk"
    }

    async fn generate_image(&self, prompt: &str, model: &str) -> Result<GeneratedImage, GenAiError> {
        log::info!("Requesting image from {}", model);
        if uses_predict(model) {
            let url = self.core.model_url(model, "predict");
            let payload = self.core.send_json(self.post(&url, &predict_image_body(prompt))).await?;
            first_prediction_image(&payload)
        } else {
            let url = self.core.model_url(model, "generateContent");
            let payload = self.core.send_json(self.post(&url, &content_image_body(prompt))).await?;
            first_inline_image(&payload)
        }
    }

    async fn submit_video_job(&self, request: &GenerationRequest) -> Result<Operation, GenAiError> {
        let url = self.core.model_url(request.model(), "predictLongRunning");
        log::info!("Submitting video job to {}", request.model());
        let payload = self
            .core
            .send_json(self.post(&url, &long_running_body(request)))
            .await?;
        Operation::from_payload(payload)
    }

    async fn fetch_status(&self, operation: &str) -> Result<Operation, GenAiError> {
        let url = self.core.operation_url(operation);
        let request = self
            .core
            .client()
            .get(&url)
            .header(API_KEY_HEADER, self.core.api_key());
        let payload = self.core.send_json(request).await?;
        Operation::from_status_payload(payload, operation)
    }

    async fn fetch_bytes(&self, reference: &MediaReference) -> Result<Vec<u8>, GenAiError> {
        check_reference(reference)?;
        match reference {
            MediaReference::InlineBytes(bytes) => Ok(bytes.clone()),
            MediaReference::DirectUri(uri) => {
                log::info!("Downloading media from {}", uri);
                let mut request = self.core.client().get(uri);
                if self.core.is_api_host(uri) {
                    request = request.header(API_KEY_HEADER, self.core.api_key());
                }
                self.core.send_for_bytes(request).await
            }
            MediaReference::FileId(file_id) => {
                let url = self.core.file_media_url(file_id, ":download")?;
                log::info!("Downloading file {}", file_id);
                let request = self
                    .core
                    .client()
                    .get(url)
                    .header(API_KEY_HEADER, self.core.api_key());
                self.core.send_for_bytes(request).await
            }
        }
    }
}
