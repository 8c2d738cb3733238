//! Scripted generation client for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use coursebuilder_shared::{CourseBuilderError, Result};

use crate::client::{GenerationClient, Generated};
use crate::shape::Shape;

type Responder = Box<dyn Fn(&str) -> std::result::Result<Generated, String> + Send + Sync>;

/// Replays queued responses in order, then falls back to a responder closure.
///
/// Every prompt is recorded so tests can assert on call counts and ordering.
pub struct ScriptedGenerator {
    model_id: String,
    queue: Mutex<VecDeque<std::result::Result<Generated, String>>>,
    responder: Option<Responder>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            model_id: "scripted".to_string(),
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer prompts not covered by the queue with `responder`.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Generated, String> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn push_value(&self, value: Value) {
        self.push(Ok(Generated::Value(value)));
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Ok(Generated::Text(text.into())));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.push(Err(message.into()));
    }

    fn push(&self, response: std::result::Result<Generated, String>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Number of `generate` calls made so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    fn model(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &str, _shape: Option<&Shape>) -> Result<Generated> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let queued = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let response = match (queued, &self.responder) {
            (Some(response), _) => response,
            (None, Some(responder)) => responder(prompt),
            (None, None) => Err("script exhausted".to_string()),
        };

        response.map_err(CourseBuilderError::Generation)
    }
}
