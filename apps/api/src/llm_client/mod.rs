//! LLM Client — the single point of entry for all completion calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! Everything else depends on [`TextCompletionProvider`], so tests can swap
//! in a scripted provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest slice of an upstream body kept in logs.
const LOG_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("prompt cannot be empty")]
    EmptyPrompt,

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned status {status}")]
    UpstreamHttp { status: u16, body: String },

    #[error("upstream API error {code}: {message}")]
    UpstreamApi { code: i64, message: String },

    #[error("upstream returned no content")]
    EmptyCompletion,

    #[error("malformed upstream response: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),
}

impl LlmError {
    /// Transport failures and 5xx responses are the only errors worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::UpstreamHttp { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the API key as a query parameter.
        LlmError::Transport(e.without_url())
    }
}

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait TextCompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn single(prompt: &'a str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, if it has any content.
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.trim().is_empty())
    }
}

/// Maps a completed HTTP exchange onto generated text or a classified error.
fn classify_response(status: StatusCode, body: &str) -> Result<String, LlmError> {
    if !status.is_success() {
        return Err(LlmError::UpstreamHttp {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let response: GenerateResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(LlmError::UpstreamApi {
            code: error.code,
            message: error.message,
        });
    }

    response.into_text().ok_or(LlmError::EmptyCompletion)
}

/// Gemini `generateContent` client. One shared `reqwest::Client`, so
/// connections are pooled across requests.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        endpoint: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            endpoint,
            max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_once(&self, request: &GenerateRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                "Completion API returned {}: {}",
                status,
                truncate(&body, LOG_BODY_LIMIT)
            );
        }

        classify_response(status, &body)
    }
}

#[async_trait]
impl TextCompletionProvider for GeminiClient {
    /// Sends one prompt. With `max_retries > 0`, transport failures and 5xx
    /// responses are retried with exponential backoff (1s, 2s, 4s, ...).
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.is_empty() {
            return Err(LlmError::EmptyPrompt);
        }

        let request = GenerateRequest::single(prompt);
        let mut attempt = 0;

        loop {
            match self.send_once(&request).await {
                Ok(text) => {
                    debug!(
                        "Completion succeeded: prompt_bytes={}, output_bytes={}",
                        prompt.len(),
                        text.len()
                    );
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = Duration::from_millis(1000 * (1 << attempt.min(10)));
                    attempt += 1;
                    warn!(
                        "Completion attempt {} failed ({}), retrying after {}ms...",
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::{Query, State},
        http::StatusCode as AxumStatus,
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    use super::*;

    /// Serves `router` on an ephemeral local port and returns its address.
    async fn spawn_upstream(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn client_for(addr: SocketAddr, timeout: Duration, max_retries: u32) -> GeminiClient {
        GeminiClient::new(
            "test-key".to_string(),
            format!("http://{addr}/generate"),
            timeout,
            max_retries,
        )
        .unwrap()
    }

    fn ok_body(text: &str) -> Value {
        json!({ "candidates": [ { "content": { "parts": [ { "text": text } ] } } ] })
    }

    #[test]
    fn test_request_envelope_shape() {
        let value = serde_json::to_value(GenerateRequest::single("hello")).unwrap();
        assert_eq!(value, json!({ "contents": [ { "parts": [ { "text": "hello" } ] } ] }));
    }

    #[test]
    fn test_classify_returns_first_fragment() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [ { "text": "first" }, { "text": "second" } ] } },
                { "content": { "parts": [ { "text": "other" } ] } }
            ]
        })
        .to_string();
        assert_eq!(classify_response(StatusCode::OK, &body).unwrap(), "first");
    }

    #[test]
    fn test_classify_non_success_preserves_body() {
        match classify_response(StatusCode::SERVICE_UNAVAILABLE, "overloaded") {
            Err(LlmError::UpstreamHttp { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected UpstreamHttp, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_application_error_object() {
        let body = json!({ "error": { "code": 400, "message": "API key not valid" } }).to_string();
        match classify_response(StatusCode::OK, &body) {
            Err(LlmError::UpstreamApi { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected UpstreamApi, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_error_wins_over_candidates() {
        let mut body = ok_body("ignored");
        body["error"] = json!({ "code": 429, "message": "quota" });
        assert!(matches!(
            classify_response(StatusCode::OK, &body.to_string()),
            Err(LlmError::UpstreamApi { code: 429, .. })
        ));
    }

    #[test]
    fn test_classify_missing_output_is_empty_completion() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            json!({ "candidates": [ { "content": { "parts": [] } } ] }),
            json!({ "candidates": [ { "finishReason": "SAFETY" } ] }),
            json!({ "candidates": [ { "content": { "parts": [ { "text": "" } ] } } ] }),
            json!({ "candidates": [ { "content": { "parts": [ { "text": " \n " } ] } } ] }),
        ] {
            assert!(
                matches!(
                    classify_response(StatusCode::OK, &body.to_string()),
                    Err(LlmError::EmptyCompletion)
                ),
                "body {body} should be EmptyCompletion"
            );
        }
    }

    #[test]
    fn test_classify_garbage_is_malformed() {
        assert!(matches!(
            classify_response(StatusCode::OK, "<html>oops</html>"),
            Err(LlmError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_retryable_classification() {
        let server = LlmError::UpstreamHttp {
            status: 502,
            body: String::new(),
        };
        let client = LlmError::UpstreamHttp {
            status: 404,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!LlmError::EmptyCompletion.is_retryable());
        assert!(!LlmError::EmptyPrompt.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_network() {
        // Port 9 (discard) is never contacted: the check happens first.
        let client = GeminiClient::new(
            "k".to_string(),
            "http://127.0.0.1:9/unused".to_string(),
            Duration::from_secs(1),
            0,
        )
        .unwrap();
        assert!(matches!(
            client.complete("").await,
            Err(LlmError::EmptyPrompt)
        ));
    }

    #[tokio::test]
    async fn test_complete_sends_envelope_and_key() {
        async fn echo(
            Query(params): Query<HashMap<String, String>>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let prompt = body["contents"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default();
            let key = params.get("key").cloned().unwrap_or_default();
            Json(ok_body(&format!("{key}:{prompt}")))
        }

        let addr = spawn_upstream(Router::new().route("/generate", post(echo))).await;
        let client = client_for(addr, Duration::from_secs(5), 0);

        let text = client.complete("Write a letter").await.unwrap();
        assert_eq!(text, "test-key:Write a letter");
    }

    #[tokio::test]
    async fn test_503_is_upstream_http_error_and_called_once() {
        let hits = Arc::new(AtomicUsize::new(0));

        async fn unavailable(State(hits): State<Arc<AtomicUsize>>) -> (AxumStatus, &'static str) {
            hits.fetch_add(1, Ordering::SeqCst);
            (AxumStatus::SERVICE_UNAVAILABLE, "model overloaded")
        }

        let router = Router::new()
            .route("/generate", post(unavailable))
            .with_state(hits.clone());
        let addr = spawn_upstream(router).await;
        let client = client_for(addr, Duration::from_secs(5), 0);

        match client.complete("prompt").await {
            Err(LlmError::UpstreamHttp { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "model overloaded");
            }
            other => panic!("expected UpstreamHttp, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        async fn stall() -> Json<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(ok_body("too late"))
        }

        let addr = spawn_upstream(Router::new().route("/generate", post(stall))).await;
        let client = client_for(addr, Duration::from_millis(200), 0);

        match client.complete("prompt").await {
            Err(LlmError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected Transport timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind to learn a free port, then close it so nothing is listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(addr, Duration::from_secs(5), 0);

        match client.complete("prompt").await {
            Err(LlmError::Transport(e)) => assert!(e.is_connect()),
            other => panic!("expected Transport connect error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        async fn stall() -> Json<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(ok_body("too late"))
        }

        let addr = spawn_upstream(Router::new().route("/generate", post(stall))).await;
        let client = client_for(addr, Duration::from_millis(100), 0);

        let err = client.complete("prompt").await.unwrap_err();
        assert!(!format!("{err} {err:?}").contains("test-key"));
    }

    #[tokio::test]
    async fn test_api_error_object_over_http() {
        async fn quota() -> Json<Value> {
            Json(json!({ "error": { "code": 429, "message": "Resource exhausted" } }))
        }

        let addr = spawn_upstream(Router::new().route("/generate", post(quota))).await;
        let client = client_for(addr, Duration::from_secs(5), 0);

        assert!(matches!(
            client.complete("prompt").await,
            Err(LlmError::UpstreamApi { code: 429, .. })
        ));
    }

    #[tokio::test]
    async fn test_retries_5xx_when_configured() {
        let hits = Arc::new(AtomicUsize::new(0));

        async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> (AxumStatus, Json<Value>) {
            if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                (AxumStatus::BAD_GATEWAY, Json(json!({})))
            } else {
                (AxumStatus::OK, Json(ok_body("recovered")))
            }
        }

        let router = Router::new()
            .route("/generate", post(flaky))
            .with_state(hits.clone());
        let addr = spawn_upstream(router).await;
        let client = client_for(addr, Duration::from_secs(5), 1);

        assert_eq!(client.complete("prompt").await.unwrap(), "recovered");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }
}
