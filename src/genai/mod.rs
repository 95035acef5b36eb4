//! Generative media integration.
//!
//! Generates a still image, submits an image-conditioned video job, polls the
//! resulting long-running operation, resolves its output into a downloadable
//! reference and writes the bytes to disk. Network access goes through the
//! [`MediaTransport`] trait so that either transport variant can be used.

mod download;
mod error;
mod mime;
mod pipeline;
mod poller;
mod prompt;
mod resolver;
mod rest;
mod sdk;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use download::{download, write_asset, write_atomic};
pub use error::GenAiError;
pub use mime::{extension_for_mime, mime_for_path};
pub use pipeline::{
    load_conditioning_image, GenAiConfig, Orchestrator, PipelineAssets, RunOutcome,
    DEFAULT_IMAGE_MODEL, DEFAULT_VIDEO_MODEL,
};
pub use poller::{
    OperationPoller, PollClock, PollState, TokioClock, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT,
};
pub use prompt::{
    prompt_or_default, validate_prompt, DEFAULT_ANIMATION_PROMPT, DEFAULT_IMAGE_PROMPT,
};
pub use resolver::{resolve, resolve_response, EntryShape, ENTRY_LIST_FIELDS, SHAPE_PRIORITY};
pub use rest::RestTransport;
pub use sdk::{SdkTransport, API_KEY_HEADER};
pub use transport::{
    build_transport, MediaTransport, TransportConfig, TransportKind, DEFAULT_API_BASE_URL,
};
pub use types::{
    ConditioningImage, GeneratedImage, GenerationRequest, MediaAsset, MediaReference, Operation,
    OutputConfig,
};
