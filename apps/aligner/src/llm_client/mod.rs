/// LLM Client — the generative-text collaborator behind tailoring suggestions.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Callers depend on the `TextGenerator` trait, never on `LlmClient`.
///
/// One request per call: retry policy belongs to the caller (see `tailoring::pipeline`).
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

use prompts::TAILORING_SYSTEM;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all suggestion calls.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport failure, 5xx, or an empty reply. Transient.
    #[error("Generation service unavailable: {0}")]
    ServiceUnavailable(String),

    /// HTTP 429. Transient; `retry_after` echoes the server's hint when present.
    #[error("Generation service rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-success status (bad key, malformed request). Not retried.
    #[error("Generation request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::ServiceUnavailable(_) | GenerationError::RateLimited { .. }
        )
    }
}

/// Generative-text collaborator contract: prompt and context in, proposed text out.
///
/// Carried in `AppState` as `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_endpoint(api_key, ANTHROPIC_API_URL.to_string())
    }

    /// Points the client at a different Messages endpoint (proxies, local fakes).
    pub fn with_endpoint(api_key: String, endpoint: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    /// Makes a single call to the Messages API.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, GenerationError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::ServiceUnavailable(format!("transport error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            return Err(classify_failure(status, &headers, body));
        }

        let llm_response: LlmResponse = response.json().await.map_err(|e| {
            GenerationError::ServiceUnavailable(format!("unreadable response body: {e}"))
        })?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );
        Ok(llm_response)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<String, GenerationError> {
        let message = build_user_message(prompt, context);
        let response = self.call(&message, TAILORING_SYSTEM).await?;

        let text = response.text().map(strip_fences).unwrap_or_default();
        if text.is_empty() {
            return Err(GenerationError::ServiceUnavailable(
                "LLM returned empty content".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// Maps a non-success status: 429 → RateLimited, 5xx → ServiceUnavailable, else Rejected.
fn classify_failure(status: StatusCode, headers: &HeaderMap, body: String) -> GenerationError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return GenerationError::RateLimited { retry_after };
    }
    if status.is_server_error() {
        return GenerationError::ServiceUnavailable(format!("status {}", status.as_u16()));
    }
    // Try to parse error message
    let message = serde_json::from_str::<AnthropicError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    GenerationError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Appends the structured context after the rendered prompt so the model sees both.
fn build_user_message(prompt: &str, context: &BTreeMap<String, String>) -> String {
    if context.is_empty() {
        return prompt.to_string();
    }
    let context_json = serde_json::to_string_pretty(context).unwrap_or_default();
    format!("{prompt}\n\nCONTEXT (JSON):\n{context_json}")
}

/// Strips ```lang ... ``` or ``` ... ``` code fences from LLM output.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    let body = match stripped.find('\n') {
        Some(newline) if !stripped[..newline].contains(' ') => &stripped[newline + 1..],
        _ => stripped,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{response::IntoResponse, routing::post, Json, Router};
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_strip_fences_with_tag() {
        assert_eq!(strip_fences("```text\nLed the migration\n```"), "Led the migration");
    }

    #[test]
    fn test_strip_fences_without_tag() {
        assert_eq!(strip_fences("```\nLed the migration\n```"), "Led the migration");
    }

    #[test]
    fn test_strip_fences_no_fences() {
        assert_eq!(strip_fences("  Led the migration \n"), "Led the migration");
    }

    #[test]
    fn test_classify_rate_limit_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("7"));
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, &headers, String::new());
        assert!(matches!(
            err,
            GenerationError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_server_error_is_unavailable() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "oops".into());
        assert!(matches!(err, GenerationError::ServiceUnavailable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_client_error_extracts_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let err = classify_failure(StatusCode::UNAUTHORIZED, &HeaderMap::new(), body.into());
        match err {
            GenerationError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_user_message_appends_context() {
        let mut context = BTreeMap::new();
        context.insert("requirement".to_string(), "Kubernetes".to_string());
        let message = build_user_message("Prompt body", &context);
        assert!(message.starts_with("Prompt body\n\nCONTEXT (JSON):\n"));
        assert!(message.contains("\"requirement\": \"Kubernetes\""));
        assert_eq!(build_user_message("Prompt body", &BTreeMap::new()), "Prompt body");
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1/messages")
    }

    #[tokio::test]
    async fn test_generate_against_local_endpoint() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async {
                Json(json!({
                    "content": [{"type": "text", "text": "```\nShipped billing APIs in Rust\n```"}],
                    "usage": {"input_tokens": 10, "output_tokens": 5}
                }))
            }),
        );
        let client = LlmClient::with_endpoint("test-key".into(), serve(app).await).unwrap();
        let text = client.generate("prompt", &BTreeMap::new()).await.unwrap();
        assert_eq!(text, "Shipped billing APIs in Rust");
    }

    #[tokio::test]
    async fn test_generate_maps_429_without_retrying() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async {
                (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()
            }),
        );
        let client = LlmClient::with_endpoint("test-key".into(), serve(app).await).unwrap();
        let err = client.generate("prompt", &BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited { retry_after: None }));
    }

    #[tokio::test]
    async fn test_generate_maps_empty_reply_to_unavailable() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async {
                Json(json!({"content": [], "usage": {"input_tokens": 1, "output_tokens": 0}}))
            }),
        );
        let client = LlmClient::with_endpoint("test-key".into(), serve(app).await).unwrap();
        let err = client.generate("prompt", &BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, GenerationError::ServiceUnavailable(_)));
    }
}
