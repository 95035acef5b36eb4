//! Prompt validation and default prompts.

use super::error::GenAiError;

/// Prompt used for image generation when the caller gives none.
pub const DEFAULT_IMAGE_PROMPT: &str =
    "A wooden ball on a ramp, clean primary colors, minimalist, clean lines.";

/// Prompt used for animation when the caller gives none.
pub const DEFAULT_ANIMATION_PROMPT: &str =
    "Animate the scene to show the wooden ball rolling down the ramp.";

/// Validate a prompt before sending it to the API.
///
/// # Errors
///
/// Returns `GenAiError::EmptyPrompt` for empty or whitespace-only prompts.
pub fn validate_prompt(prompt: &str) -> Result<(), GenAiError> {
    if prompt.trim().is_empty() {
        return Err(GenAiError::EmptyPrompt);
    }
    Ok(())
}

/// Use `prompt` when it has content, `fallback` otherwise.
pub fn prompt_or_default(prompt: Option<&str>, fallback: &str) -> String {
    prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
