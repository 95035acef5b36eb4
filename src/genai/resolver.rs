//! Result resolver - turns a terminal operation into a single media reference.
//!
//! Completed operations describe their output in several layouts. The list of
//! generated entries lives under `generatedVideos` or `videos`; each entry may
//! wrap its payload in a `video` field, and the payload itself may be a bare
//! file id, a `{uri}` object, a `{file}` object (string or `{name}`), a `{name}`
//! object, or inline base64 bytes. Those layouts are listed once, in priority
//! order, in [`SHAPE_PRIORITY`]; the resolver performs no I/O.

use serde_json::Value;

use super::error::GenAiError;
use super::transport::decode_base64;
use super::types::{MediaReference, Operation};

/// Field names that may hold the list of generated entries, in lookup order.
pub const ENTRY_LIST_FIELDS: [&str; 2] = ["generatedVideos", "videos"];

/// A recognized layout for a single generated entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    /// `"files/abc"`
    PlainId,
    /// `{"uri": "https://..."}`
    Uri,
    /// `{"videoBytes": "<base64>"}` or `{"bytesBase64Encoded": "<base64>"}`
    InlineBytes,
    /// `{"file": "files/abc"}`
    FileString,
    /// `{"file": {"name": "files/abc"}}`
    FileObject,
    /// `{"name": "files/abc"}`
    Name,
}

/// Shapes tried against each entry, most specific first. A direct URI wins
/// over any file identifier present on the same entry.
pub const SHAPE_PRIORITY: [EntryShape; 6] = [
    EntryShape::PlainId,
    EntryShape::Uri,
    EntryShape::InlineBytes,
    EntryShape::FileString,
    EntryShape::FileObject,
    EntryShape::Name,
];

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl EntryShape {
    /// Try to read `target` as this shape.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError::MalformedResponse` if inline bytes are not valid base64.
    pub fn extract(self, target: &Value) -> Result<Option<MediaReference>, GenAiError> {
        let reference = match self {
            EntryShape::PlainId => {
                non_empty_str(Some(target)).map(|id| MediaReference::FileId(id.to_string()))
            }
            EntryShape::Uri => non_empty_str(target.get("uri"))
                .map(|uri| MediaReference::DirectUri(uri.to_string())),
            EntryShape::InlineBytes => {
                let field = ["videoBytes", "bytesBase64Encoded"]
                    .into_iter()
                    .find_map(|field| non_empty_str(target.get(field)).map(|data| (field, data)));
                match field {
                    Some((field, data)) => Some(MediaReference::InlineBytes(decode_base64(data, field)?)),
                    None => None,
                }
            }
            EntryShape::FileString => non_empty_str(target.get("file"))
                .map(|id| MediaReference::FileId(id.to_string())),
            EntryShape::FileObject => non_empty_str(target.get("file").and_then(|file| file.get("name")))
                .map(|id| MediaReference::FileId(id.to_string())),
            EntryShape::Name => non_empty_str(target.get("name"))
                .map(|id| MediaReference::FileId(id.to_string())),
        };
        Ok(reference)
    }
}

/// Resolve a terminal operation into exactly one media reference.
///
/// # Errors
///
/// - `GenAiError::OperationIncomplete` if the operation is not done
/// - `GenAiError::OperationFailed` if the operation carries a remote error
/// - `GenAiError::NoMediaFound` if the entry list is missing or empty
/// - `GenAiError::UnresolvedReference` if no entry matches a known shape
pub fn resolve(operation: &Operation) -> Result<MediaReference, GenAiError> {
    if !operation.done {
        return Err(GenAiError::OperationIncomplete {
            operation: operation.name.clone(),
        });
    }

    if let Some(message) = operation.error_message() {
        log::warn!("Operation {} finished with an error: {}", operation.name, message);
        return Err(GenAiError::OperationFailed {
            operation: operation.name.clone(),
            message,
        });
    }

    match &operation.response {
        Some(response) => resolve_response(response),
        None => Err(GenAiError::NoMediaFound),
    }
}

/// Resolve the `response` payload of a completed operation.
pub fn resolve_response(response: &Value) -> Result<MediaReference, GenAiError> {
    let entries = ENTRY_LIST_FIELDS
        .iter()
        .find_map(|field| response.get(*field).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default();
    if entries.is_empty() {
        return Err(GenAiError::NoMediaFound);
    }

    for entry in entries {
        let target = entry.get("video").filter(|v| !v.is_null()).unwrap_or(entry);
        for shape in SHAPE_PRIORITY {
            if let Some(reference) = shape.extract(target)? {
                log::debug!("Resolved media entry as {:?}", shape);
                return Ok(reference);
            }
        }
    }

    Err(GenAiError::UnresolvedReference(format!(
        "none of {} entries matched a known shape (first: {})",
        entries.len(),
        entries[0]
    )))
}
