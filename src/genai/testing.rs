//! Test doubles for the transport and the poll clock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::error::GenAiError;
use super::poller::PollClock;
use super::transport::MediaTransport;
use super::types::{GeneratedImage, GenerationRequest, MediaReference, Operation};

/// Clock that only moves when slept on or advanced explicitly.
pub(crate) struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl PollClock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Transport that replays canned responses and counts calls.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    image: Mutex<Option<Result<GeneratedImage, GenAiError>>>,
    submission: Mutex<Option<Result<Operation, GenAiError>>>,
    statuses: Mutex<VecDeque<Result<Operation, GenAiError>>>,
    pending_forever: Option<String>,
    bytes: HashMap<String, Vec<u8>>,
    advance: Option<(Arc<ManualClock>, Duration)>,
    status_fetches: AtomicUsize,
    byte_fetches: AtomicUsize,
    submitted: Mutex<Vec<GenerationRequest>>,
}

fn reference_key(reference: &MediaReference) -> String {
    match reference {
        MediaReference::DirectUri(uri) => format!("uri:{}", uri),
        MediaReference::FileId(id) => format!("file:{}", id),
        MediaReference::InlineBytes(_) => "inline".to_string(),
    }
}

impl ScriptedTransport {
    pub(crate) fn with_statuses(statuses: Vec<Result<Operation, GenAiError>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    pub(crate) fn never_done(name: &str) -> Self {
        Self {
            pending_forever: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Advance `clock` by `by` on every status fetch.
    pub(crate) fn advancing(mut self, clock: Arc<ManualClock>, by: Duration) -> Self {
        self.advance = Some((clock, by));
        self
    }

    pub(crate) fn with_image(self, image: Result<GeneratedImage, GenAiError>) -> Self {
        *self.image.lock().unwrap() = Some(image);
        self
    }

    pub(crate) fn with_submission(self, submission: Result<Operation, GenAiError>) -> Self {
        *self.submission.lock().unwrap() = Some(submission);
        self
    }

    pub(crate) fn with_bytes(mut self, reference: MediaReference, bytes: Vec<u8>) -> Self {
        self.bytes.insert(reference_key(&reference), bytes);
        self
    }

    pub(crate) fn status_fetches(&self) -> usize {
        self.status_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn byte_fetches(&self) -> usize {
        self.byte_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn submitted(&self) -> Vec<GenerationRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate_image(&self, _prompt: &str, _model: &str) -> Result<GeneratedImage, GenAiError> {
        self.image
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(GenAiError::EmptyResult("no scripted image".to_string())))
    }

    async fn submit_video_job(&self, request: &GenerationRequest) -> Result<Operation, GenAiError> {
        self.submitted.lock().unwrap().push(request.clone());
        self.submission
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(GenAiError::MalformedResponse("no scripted submission".to_string())))
    }

    async fn fetch_status(&self, operation: &str) -> Result<Operation, GenAiError> {
        self.status_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some((clock, by)) = &self.advance {
            clock.advance(*by);
        }
        if let Some(next) = self.statuses.lock().unwrap().pop_front() {
            return next;
        }
        match &self.pending_forever {
            Some(name) => Ok(Operation::pending(name.clone())),
            None => Err(GenAiError::MalformedResponse(format!(
                "no scripted status left for {}",
                operation
            ))),
        }
    }

    async fn fetch_bytes(&self, reference: &MediaReference) -> Result<Vec<u8>, GenAiError> {
        self.byte_fetches.fetch_add(1, Ordering::SeqCst);
        if let MediaReference::InlineBytes(bytes) = reference {
            return Ok(bytes.clone());
        }
        self.bytes
            .get(&reference_key(reference))
            .cloned()
            .ok_or_else(|| GenAiError::Transport {
                status: 404,
                body: format!("no scripted bytes for {:?}", reference),
            })
    }
}
