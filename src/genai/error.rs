//! GenAiError - failure taxonomy shared by every generation component.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while generating, polling, resolving or downloading media.
#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("Empty prompt")]
    EmptyPrompt,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL that could not be built or parsed
        url: String,
        /// Parser message
        reason: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote call returned a non-success status.
    #[error("Request failed with status {status}: {body}")]
    Transport {
        /// HTTP status code returned by the service
        status: u16,
        /// Response body, kept verbatim for diagnostics
        body: String,
    },

    /// The remote call succeeded but the payload lacks a required field.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The remote call succeeded but carried no usable media.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Operation completed but no media entries found in response")]
    NoMediaFound,

    #[error("Could not resolve media reference: {0}")]
    UnresolvedReference(String),

    #[error("Operation '{operation}' did not complete within {elapsed:?}")]
    PollTimeout {
        /// Wall-clock time spent polling before giving up
        elapsed: Duration,
        /// Name of the operation that was still running
        operation: String,
    },

    #[error("Polling of operation '{operation}' was cancelled")]
    Cancelled {
        /// Name of the operation being polled
        operation: String,
    },

    /// The operation reached a terminal state carrying a remote error.
    #[error("Operation '{operation}' failed: {message}")]
    OperationFailed {
        /// Name of the failed operation
        operation: String,
        /// Message reported by the service
        message: String,
    },

    #[error("Operation '{operation}' is not done yet")]
    OperationIncomplete {
        /// Name of the operation handed to the resolver
        operation: String,
    },

    /// Fetching bytes for a destination failed. The inner error is untouched.
    #[error("Download to '{}' failed: {source}", path.display())]
    Download {
        /// Destination the bytes were meant for
        path: PathBuf,
        /// The error raised by the transport
        #[source]
        source: Box<GenAiError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenAiError {
    /// Strip any `Download` wrapping and return the underlying error.
    pub fn root(&self) -> &GenAiError {
        match self {
            GenAiError::Download { source, .. } => source.root(),
            other => other,
        }
    }
}
