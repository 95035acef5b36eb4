//! RestTransport - direct calls to the generative language REST endpoints.
//!
//! Authenticates with the API key as a `key` query parameter.

use async_trait::async_trait;
use serde::Serialize;

use super::error::GenAiError;
use super::transport::{
    check_reference, encode_base64, first_inline_image, HttpCore, MediaTransport,
    DEFAULT_API_BASE_URL,
};
use super::types::{GeneratedImage, GenerationRequest, MediaReference, Operation};

/// Sampling temperature for image generation.
const IMAGE_TEMPERATURE: f32 = 0.6;

/// Request body for `:generateContent` and `:generateVideo`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_config: Option<VideoConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoConfig<'a> {
    duration_seconds: u32,
    resolution: &'a str,
    aspect_ratio: &'a str,
}

/// Transport that calls the REST endpoints directly.
pub struct RestTransport {
    core: HttpCore,
}

impl RestTransport {
    /// Create a transport against the public API.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError::MissingApiKey` if `api_key` is empty.
    pub fn with_api_key(api_key: String) -> Result<Self, GenAiError> {
        Self::with_base_url(api_key, DEFAULT_API_BASE_URL.to_string())
    }

    /// Create a transport against a custom base URL.
    ///
    /// Useful for testing against a mock server.
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

    fn key_param(&self) -> [(&'static str, &str); 1] {
        [("key", self.core.api_key())]
    }
}

fn image_request(prompt: &str) -> ContentRequest<'_> {
    ContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part::Text { text: prompt }],
        }],
        generation_config: Some(GenerationConfig {
            temperature: IMAGE_TEMPERATURE,
        }),
        video_config: None,
    }
}

fn video_request(request: &GenerationRequest) -> ContentRequest<'_> {
    let mut parts = vec![Part::Text {
        text: request.prompt(),
    }];
    if let Some(image) = request.conditioning_image() {
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: &image.mime_type,
                data: encode_base64(&image.bytes),
            },
        });
    }

    let output = request.output_config();
    ContentRequest {
        contents: vec![Content { role: "user", parts }],
        generation_config: None,
        video_config: Some(VideoConfig {
            duration_seconds: output.duration_seconds,
            resolution: &output.resolution,
            aspect_ratio: &output.aspect_ratio,
        }),
    }
}

#[async_trait]
impl MediaTransport for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn generate_image(&self, prompt: &str, model: &str) -> Result<GeneratedImage, GenAiError> {
        let url = self.core.model_url(model, "generateContent");
        log::info!("Requesting image from {}", model);

        let request = self
            .core
            .client()
            .post(&url)
            .query(&self.key_param())
            .json(&image_request(prompt));
        let payload = self.core.send_json(request).await?;
        first_inline_image(&payload)
    }

    async fn submit_video_job(&self, request: &GenerationRequest) -> Result<Operation, GenAiError> {
        let url = self.core.model_url(request.model(), "generateVideo");
        log::info!("Submitting video job to {}", request.model());

        let http_request = self
            .core
            .client()
            .post(&url)
            .query(&self.key_param())
            .json(&video_request(request));
        let payload = self.core.send_json(http_request).await?;
        Operation::from_payload(payload)
    }

    async fn fetch_status(&self, operation: &str) -> Result<Operation, GenAiError> {
        let url = self.core.operation_url(operation);
        let request = self.core.client().get(&url).query(&self.key_param());
        let payload = self.core.send_json(request).await?;
        Operation::from_status_payload(payload, operation)
    }

    async fn fetch_bytes(&self, reference: &MediaReference) -> Result<Vec<u8>, GenAiError> {
        check_reference(reference)?;
        match reference {
            MediaReference::InlineBytes(bytes) => Ok(bytes.clone()),
            MediaReference::DirectUri(uri) => {
                log::info!("Downloading media from {}", uri);
                self.core.send_for_bytes(self.core.client().get(uri)).await
            }
            MediaReference::FileId(file_id) => {
                let url = self.core.file_media_url(file_id, "")?;
                log::info!("Downloading file {}", file_id);
                let request = self.core.client().get(url).query(&self.key_param());
                self.core.send_for_bytes(request).await
            }
        }
    }
}
