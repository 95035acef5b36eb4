//! Orchestrator - sequences image generation, video submission, polling,
//! resolution and download.
//!
//! Every stage fails fast: the first error is returned as-is and nothing is
//! retried. Artifacts written by earlier stages stay on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::download::{download, write_asset};
use super::error::GenAiError;
use super::mime::{extension_for_mime, mime_for_path};
use super::poller::{OperationPoller, PollClock, TokioClock, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use super::prompt::validate_prompt;
use super::resolver::resolve;
use super::transport::{build_transport, MediaTransport, TransportConfig, TransportKind, DEFAULT_API_BASE_URL};
use super::types::{ConditioningImage, GeneratedImage, GenerationRequest, MediaAsset, OutputConfig};

/// Default model for still images.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Default model for image-conditioned video.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-generate-preview";

/// Explicit configuration handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenAiConfig {
    pub transport: TransportConfig,
    pub image_model: String,
    pub video_model: String,
    pub output: OutputConfig,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl GenAiConfig {
    /// Defaults for everything except the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig {
                api_key: api_key.into(),
                base_url: DEFAULT_API_BASE_URL.to_string(),
                kind: TransportKind::default(),
            },
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            output: OutputConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// The two artifacts of a full image-to-video run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineAssets {
    pub image: MediaAsset,
    pub video: MediaAsset,
}

/// Drives generation requests against one transport.
pub struct Orchestrator<C = TokioClock> {
    config: GenAiConfig,
    transport: Box<dyn MediaTransport>,
    poller: OperationPoller<C>,
}

impl Orchestrator<TokioClock> {
    /// Build the transport selected in `config` and a wall-clock poller.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError::MissingApiKey` if the configured key is empty.
    pub fn new(config: GenAiConfig) -> Result<Self, GenAiError> {
        let transport = build_transport(&config.transport)?;
        let poller = OperationPoller::new(config.poll_interval, config.poll_timeout);
        Ok(Self::with_transport(config, transport, poller))
    }
}

impl<C: PollClock> Orchestrator<C> {
    pub fn with_transport(
        config: GenAiConfig,
        transport: Box<dyn MediaTransport>,
        poller: OperationPoller<C>,
    ) -> Self {
        Self {
            config,
            transport,
            poller,
        }
    }

    pub fn config(&self) -> &GenAiConfig {
        &self.config
    }

    /// Cancelling this token aborts a video job that is being polled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.poller.cancellation_token()
    }

    /// Generate a still image and write it to `destination`.
    ///
    /// # Errors
    ///
    /// `GenAiError::EmptyPrompt`, any transport error, or `GenAiError::Io`.
    pub async fn generate_image(&self, prompt: &str, destination: &Path) -> Result<MediaAsset, GenAiError> {
        let image = self.fetch_image(prompt).await?;
        write_asset(destination, &image.bytes, &image.mime_type).await
    }

    /// Generate a still image and write it to `dir/<stem>.<ext>`, where the
    /// extension follows the MIME type the model returned.
    pub async fn generate_image_in(
        &self,
        prompt: &str,
        dir: &Path,
        stem: &str,
    ) -> Result<MediaAsset, GenAiError> {
        let image = self.fetch_image(prompt).await?;
        let destination = dir.join(format!("{}.{}", stem, extension_for_mime(&image.mime_type)));
        write_asset(&destination, &image.bytes, &image.mime_type).await
    }

    async fn fetch_image(&self, prompt: &str) -> Result<GeneratedImage, GenAiError> {
        validate_prompt(prompt)?;
        log::info!("Generating image for prompt: {}", prompt);
        self.transport
            .generate_image(prompt, &self.config.image_model)
            .await
    }

    /// Animate `image` into a video written to `destination`.
    ///
    /// Submits the job, polls it to completion, resolves the result and
    /// downloads it.
    pub async fn animate_image(
        &self,
        image: ConditioningImage,
        prompt: &str,
        destination: &Path,
    ) -> Result<MediaAsset, GenAiError> {
        validate_prompt(prompt)?;
        let request = GenerationRequest::new(
            prompt,
            Some(image),
            self.config.video_model.clone(),
            self.config.output.clone(),
        );

        log::info!("Submitting video generation for prompt: {}", prompt);
        let operation = self.transport.submit_video_job(&request).await?;
        log::info!("Video job submitted, operation: {}", operation.name);

        let finished = self
            .poller
            .poll_until_done(self.transport.as_ref(), operation)
            .await?;
        let reference = resolve(&finished)?;
        download(&reference, self.transport.as_ref(), destination).await
    }

    /// Animate an image file from disk.
    pub async fn animate_image_file(
        &self,
        image_path: &Path,
        prompt: &str,
        destination: &Path,
    ) -> Result<MediaAsset, GenAiError> {
        let image = load_conditioning_image(image_path).await?;
        self.animate_image(image, prompt, destination).await
    }

    /// Generate an image, then animate it.
    pub async fn image_to_video(
        &self,
        image_prompt: &str,
        animation_prompt: &str,
        image_destination: &Path,
        video_destination: &Path,
    ) -> Result<PipelineAssets, GenAiError> {
        let image = self.generate_image(image_prompt, image_destination).await?;
        let video = self
            .animate_image_file(image.file_path(), animation_prompt, video_destination)
            .await?;
        Ok(PipelineAssets { image, video })
    }
}

/// Read an image from disk and infer its MIME type from the extension.
pub async fn load_conditioning_image(path: &Path) -> Result<ConditioningImage, GenAiError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(ConditioningImage {
        bytes,
        mime_type: mime_for_path(path).to_string(),
    })
}

/// Machine-readable result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    #[serde(rename_all = "camelCase")]
    Ok {
        file_path: PathBuf,
        mime_type: String,
        #[serde(default)]
        file_url: String,
    },
    Error { message: String },
}

impl RunOutcome {
    pub fn from_result(result: &Result<MediaAsset, GenAiError>) -> Self {
        match result {
            Ok(asset) => RunOutcome::Ok {
                file_path: asset.file_path().to_path_buf(),
                mime_type: asset.mime_type().to_string(),
                file_url: format!("file://{}", asset.file_path().display()),
            },
            Err(error) => RunOutcome::Error {
                message: error.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RunOutcome::Ok { .. })
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_ok() {
            0
        } else {
            1
        }
    }
}
