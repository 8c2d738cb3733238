//! The Generation Client contract.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use coursebuilder_shared::{CourseBuilderError, Result};

use crate::shape::Shape;

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    /// Free text, returned when no shape was requested.
    Text(String),
    /// A structured value, returned when a shape was requested.
    Value(Value),
}

impl Generated {
    /// The free-text form. Structured values are rendered as compact JSON.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Value(value) => value.to_string(),
        }
    }
}

/// Invokes an external generative-text service.
///
/// Implementations fail with [`CourseBuilderError::Generation`] on provider
/// errors, malformed responses, or timeouts. Callers must not assume partial
/// results on failure.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Identifier of the backing model, for logs.
    fn model(&self) -> &str;

    /// Generate free text (`shape = None`) or a value matching `shape`.
    async fn generate(&self, prompt: &str, shape: Option<&Shape>) -> Result<Generated>;
}

/// Run a structured generation call, check the value against `shape`, and
/// deserialize it into `T`.
///
/// Any mismatch is a [`CourseBuilderError::Generation`].
pub async fn generate_structured<T: DeserializeOwned>(
    client: &dyn GenerationClient,
    prompt: &str,
    shape: &Shape,
) -> Result<T> {
    debug!(model = client.model(), prompt_len = prompt.len(), "structured generation call");

    let value = match client.generate(prompt, Some(shape)).await? {
        Generated::Value(value) => value,
        Generated::Text(text) => parse_json_text(&text)?,
    };

    shape.check(&value).map_err(|mismatch| {
        CourseBuilderError::generation(format!("response does not match shape: {mismatch}"))
    })?;

    serde_json::from_value(value).map_err(|e| {
        CourseBuilderError::generation(format!("response could not be decoded: {e}"))
    })
}

/// At most `max_chars` characters of `text`, cut on a character boundary.
pub(crate) fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Parse a model's text reply as JSON, tolerating a surrounding Markdown fence.
pub fn parse_json_text(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|e| {
        CourseBuilderError::generation(format!(
            "response is not valid JSON: {e} (got: {})",
            preview(body, 200)
        ))
    })
}
