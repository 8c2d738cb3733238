//! OpenRouter (OpenAI-compatible chat completions) generation client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use coursebuilder_shared::{AppConfig, CourseBuilderError, Result, read_api_key};

use crate::client::{GenerationClient, Generated, parse_json_text, preview};
use crate::shape::Shape;

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("CourseBuilder/", env!("CARGO_PKG_VERSION"));

/// Maximum number of response bytes echoed back in error messages.
const ERROR_BODY_PREVIEW: usize = 300;

/// Generation client backed by an OpenAI-compatible HTTP API.
pub struct OpenRouterClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    /// Build a client for `base_url` (e.g. `https://openrouter.ai/api/v1`).
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base = Url::parse(base_url).map_err(|e| {
            CourseBuilderError::config(format!("invalid generation base URL '{base_url}': {e}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("chat/completions").map_err(|e| {
            CourseBuilderError::config(format!("invalid generation base URL '{base_url}': {e}"))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CourseBuilderError::config(format!("client build: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build a client from the `[openrouter]` config section and the API key env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = read_api_key(config)?;
        Self::new(
            &config.openrouter.base_url,
            config.openrouter.default_model.clone(),
            api_key,
            Duration::from_secs(config.openrouter.request_timeout_secs),
        )
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl GenerationClient for OpenRouterClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, structured = shape.is_some()))]
    async fn generate(&self, prompt: &str, shape: Option<&Shape>) -> Result<Generated> {
        let start = Instant::now();

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: shape.map(|s| ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "response",
                    strict: false,
                    schema: s.to_json_schema(),
                },
            }),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CourseBuilderError::generation(format!("request timed out: {e}"))
                } else {
                    CourseBuilderError::generation(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CourseBuilderError::generation(format!(
                "HTTP {status}: {}",
                preview(&body, ERROR_BODY_PREVIEW)
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            CourseBuilderError::generation(format!("malformed provider response: {e}"))
        })?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CourseBuilderError::generation("no choices in response"))?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!("generation stopped at the token limit; output may be truncated");
        }

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CourseBuilderError::generation("empty response content"))?;

        if let Some(usage) = chat.usage {
            debug!(
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                latency_ms = start.elapsed().as_millis() as u64,
                "generation call complete"
            );
        }

        match shape {
            Some(_) => Ok(Generated::Value(parse_json_text(&content)?)),
            None => Ok(Generated::Text(content)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Field;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7 }
        })
    }

    fn client_for(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::new(
            &format!("{}/api/v1", server.uri()),
            "test/model",
            "sk-test",
            Duration::from_secs(5),
        )
        .expect("build client")
    }

    #[tokio::test]
    async fn free_text_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "test/model" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello there")))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).generate("hi", None).await.unwrap();
        assert_eq!(result, Generated::Text("Hello there".into()));
    }

    #[tokio::test]
    async fn structured_generation_sends_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {
                    "type": "json_schema",
                    "json_schema": { "schema": { "required": ["title"] } }
                }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("```json\n{\"title\": \"Course\"}\n```")),
            )
            .mount(&server)
            .await;

        let shape = Shape::Object(vec![Field::required("title", Shape::String)]);
        let result = client_for(&server).generate("outline", Some(&shape)).await.unwrap();
        assert_eq!(result, Generated::Value(json!({ "title": "Course" })));
    }

    #[tokio::test]
    async fn provider_error_is_generation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("hi", None).await.unwrap_err();
        match err {
            CourseBuilderError::Generation(msg) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("rate limited"));
            }
            other => panic!("expected Generation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_ascii_error_body_is_truncated_safely() {
        let server = MockServer::start().await;
        let body = "ü".repeat(ERROR_BODY_PREVIEW + 50);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string(body))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("hi", None).await.unwrap_err();
        match err {
            CourseBuilderError::Generation(msg) => {
                assert!(msg.starts_with("HTTP 500"));
                assert_eq!(msg.matches('ü').count(), ERROR_BODY_PREVIEW);
            }
            other => panic!("expected Generation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_structured_content_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("not json at all")))
            .mount(&server)
            .await;

        let shape = Shape::Object(vec![Field::required("title", Shape::String)]);
        let err = client_for(&server)
            .generate("outline", Some(&shape))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn empty_choices_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("hi", None).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(
            &server.uri(),
            "test/model",
            "sk-test",
            Duration::from_millis(50),
        )
        .unwrap();
        let err = client.generate("hi", None).await.unwrap_err();
        assert!(matches!(err, CourseBuilderError::Generation(_)));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = OpenRouterClient::new("not a url", "m", "k", Duration::from_secs(1))
            .err()
            .expect("should fail");
        assert!(matches!(err, CourseBuilderError::Config { .. }));
    }
}
