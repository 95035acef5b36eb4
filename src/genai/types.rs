//! Data model for generation requests, remote operations and media artifacts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GenAiError;

/// Default clip length in seconds.
pub const DEFAULT_DURATION_SECONDS: u32 = 8;

/// Default output resolution.
pub const DEFAULT_RESOLUTION: &str = "720p";

/// Default aspect ratio.
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// Video output settings sent along with a job submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_duration")]
    pub duration_seconds: u32,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_SECONDS
}

fn default_resolution() -> String {
    DEFAULT_RESOLUTION.to_string()
}

fn default_aspect_ratio() -> String {
    DEFAULT_ASPECT_RATIO.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_DURATION_SECONDS,
            resolution: default_resolution(),
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

/// An image used to condition video generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditioningImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A fully specified generation request. Built once by the orchestrator and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    conditioning_image: Option<ConditioningImage>,
    model: String,
    output_config: OutputConfig,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        conditioning_image: Option<ConditioningImage>,
        model: impl Into<String>,
        output_config: OutputConfig,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            conditioning_image,
            model: model.into(),
            output_config,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn conditioning_image(&self) -> Option<&ConditioningImage> {
        self.conditioning_image.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn output_config(&self) -> &OutputConfig {
        &self.output_config
    }
}

/// Image bytes returned by a synchronous image generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A handle to an asynchronous remote job.
///
/// Operations are only ever replaced by a fresh status fetch; the local
/// process never flips `done` or edits the payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Operation {
    /// A freshly submitted, not yet finished operation.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            response: None,
            error: None,
        }
    }

    /// Parse an operation payload returned by the service.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError::MalformedResponse` if the payload is not an object
    /// or lacks a non-empty `name`.
    pub fn from_payload(payload: Value) -> Result<Self, GenAiError> {
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GenAiError::MalformedResponse("operation response is missing 'name'".to_string())
            })?;
        Self::from_payload_with_name(payload, name)
    }

    /// Parse a status payload for a known operation. Payloads that omit the
    /// name inherit `name`.
    pub fn from_status_payload(payload: Value, name: &str) -> Result<Self, GenAiError> {
        let reported = payload
            .get("name")
            .and_then(Value::as_str)
            .filter(|reported| !reported.is_empty())
            .unwrap_or(name)
            .to_string();
        Self::from_payload_with_name(payload, reported)
    }

    fn from_payload_with_name(payload: Value, name: String) -> Result<Self, GenAiError> {
        let Value::Object(mut fields) = payload else {
            return Err(GenAiError::MalformedResponse(
                "operation response is not a JSON object".to_string(),
            ));
        };
        let done = fields.get("done").and_then(Value::as_bool).unwrap_or(false);
        let response = fields
            .remove("response")
            .filter(|v| !v.is_null())
            .map(normalize_response);
        let error = fields.remove("error").filter(|v| !v.is_null());
        Ok(Self {
            name,
            done,
            response,
            error,
        })
    }

    /// Human-readable message from the remote error payload, if any.
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        Some(message)
    }
}

/// Expose `generateVideoResponse.generatedSamples` as `generatedVideos`.
///
/// The long-running video endpoint nests its samples one level down. An
/// existing `generatedVideos` list is left alone.
fn normalize_response(mut response: Value) -> Value {
    let samples = response
        .pointer("/generateVideoResponse/generatedSamples")
        .cloned();
    if let (Some(samples), Some(fields)) = (samples, response.as_object_mut()) {
        fields
            .entry("generatedVideos".to_string())
            .or_insert(samples);
    }
    response
}

/// A shape-normalized pointer to downloadable bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    DirectUri(String),
    FileId(String),
    InlineBytes(Vec<u8>),
}

/// A media file that has been fully written to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    file_path: PathBuf,
    mime_type: String,
}

impl MediaAsset {
    pub(crate) fn new(file_path: PathBuf, mime_type: impl Into<String>) -> Self {
        Self {
            file_path,
            mime_type: mime_type.into(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}
