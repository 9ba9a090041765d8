// crates/scout-llm/src/client.rs
// ============================================================================
// Module: LLM Client
// Description: Strict-JSON chat-completion caller with retry/backoff.
// Purpose: Guarantee every caller gets back a syntactically valid JSON
//          payload or a terminal, typed error (spec.md §4.D).
// Dependencies: scout-core, tokio, tracing
// ============================================================================

//! ## Overview
//! [`LlmClient::chat_completion`] sends one chat-completion request and
//! keeps retrying — up to three attempts, `2^(attempt-1)` second backoff —
//! while the failure is one of the retriable conditions named in
//! `spec.md` §4.D: transport failure, `429`, an unparseable transport-level
//! body, a missing content field, or content that is itself not valid
//! JSON. Any other non-2xx status fails on the first attempt.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use scout_core::HttpMethod;
use scout_core::HttpRequest;
use scout_core::Sleeper;
use scout_core::Transport;
use serde_json::Value;
use serde_json::json;

use crate::errors::LlmClientError;

/// Default sampling temperature (`spec.md` §4.D).
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Maximum attempts before failing with [`LlmClientError::RetriesExhausted`].
const MAX_ATTEMPTS: u32 = 3;

/// Static configuration for an [`LlmClient`].
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Chat-completion endpoint base URL.
    pub base_url: String,
    /// API key, attached as `Authorization: Bearer <key>`.
    pub api_key: String,
    /// Model identifier to request.
    pub model: String,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl LlmClientConfig {
    /// Builds a config pointed at the OpenRouter chat-completions endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// A chat-completion request's tunable knobs, carried per-call so a prompt's
/// `model_defaults` can drive them.
#[derive(Debug, Clone, Copy)]
pub struct CallParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Max output tokens.
    pub max_tokens: u32,
}

impl Default for CallParams {
    fn default() -> Self {
        Self { temperature: DEFAULT_TEMPERATURE, max_tokens: 2000 }
    }
}

/// Strict-JSON chat-completion caller.
pub struct LlmClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    config: LlmClientConfig,
}

impl LlmClient {
    /// Builds a client against `config`.
    #[must_use]
    pub const fn new(config: LlmClientConfig, transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { transport, sleeper, config }
    }

    /// Sends `prompt_body` as the sole user message and returns the parsed
    /// content payload as opaque JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LlmClientError::Status`] on an immediate non-2xx, non-429
    /// failure, and [`LlmClientError::RetriesExhausted`] once all retriable
    /// failure modes have consumed every attempt.
    pub async fn chat_completion(&self, prompt_body: &str, params: CallParams) -> Result<Value, LlmClientError> {
        let mut last_reason = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(prompt_body, params).await {
                Ok(content) => return Ok(content),
                Err(AttemptFailure::Terminal(status, body)) => return Err(LlmClientError::Status { status, body }),
                Err(AttemptFailure::Retriable { reason, retry_after }) => {
                    last_reason = reason;
                    if attempt == MAX_ATTEMPTS {
                        break;
                    }
                    let wait = retry_after.unwrap_or_else(|| Duration::from_secs(2u64.saturating_pow(attempt - 1)));
                    tracing::debug!(attempt, wait_ms = wait.as_millis() as u64, reason = last_reason.as_str(), "retrying llm call");
                    self.sleeper.sleep(wait).await;
                }
            }
        }
        Err(LlmClientError::RetriesExhausted { attempts: MAX_ATTEMPTS, reason: last_reason })
    }

    async fn attempt(&self, prompt_body: &str, params: CallParams) -> Result<Value, AttemptFailure> {
        let request = self.build_request(prompt_body, params);
        let response = self.transport.send(request).await.map_err(|err| AttemptFailure::Retriable { reason: err.to_string(), retry_after: None })?;

        if response.status == 429 {
            let retry_after = response.header("retry-after").and_then(|value| value.trim().parse::<u64>().ok()).map(Duration::from_secs);
            return Err(AttemptFailure::Retriable { reason: "status 429".to_string(), retry_after });
        }
        if !(200..=299).contains(&response.status) {
            let body = String::from_utf8_lossy(&response.body).to_string();
            return Err(AttemptFailure::Terminal(response.status, body));
        }

        let envelope: Value = serde_json::from_slice(&response.body)
            .map_err(|err| AttemptFailure::Retriable { reason: format!("transport body not valid json: {err}"), retry_after: None })?;

        let content_str = envelope
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| AttemptFailure::Retriable { reason: "response missing choices[0].message.content".to_string(), retry_after: None })?;

        serde_json::from_str(content_str).map_err(|err| AttemptFailure::Retriable { reason: format!("content field not valid json: {err}"), retry_after: None })
    }

    fn build_request(&self, prompt_body: &str, params: CallParams) -> HttpRequest {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("authorization".to_string(), format!("Bearer {}", self.config.api_key));
        headers.insert("user-agent".to_string(), self.config.user_agent.clone());
        let payload = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt_body}],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "response_format": {"type": "json_object"},
        });
        HttpRequest {
            method: HttpMethod::Post,
            url: self.config.base_url.clone(),
            headers,
            body: Some(serde_json::to_vec(&payload).unwrap_or_default()),
        }
    }
}

enum AttemptFailure {
    Terminal(u16, String),
    Retriable { reason: String, retry_after: Option<Duration> },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use std::sync::Mutex as StdMutex;

    use scout_core::HttpResponse;
    use scout_core::TokioSleeper;
    use scout_core::TransportError;

    use super::*;

    struct ScriptedTransport {
        responses: StdMutex<Vec<HttpResponse>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self { responses: StdMutex::new(responses) }
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(TransportError("scripted transport exhausted".to_string()));
            }
            Ok(responses.remove(0))
        }
    }

    fn envelope_response(content: &str) -> HttpResponse {
        let body = json!({"choices": [{"message": {"content": content}}]});
        HttpResponse { status: 200, headers: BTreeMap::new(), body: serde_json::to_vec(&body).unwrap() }
    }

    fn client(transport: ScriptedTransport) -> LlmClient {
        LlmClient::new(LlmClientConfig::new("key", "test-model", "collaboration-scout/test"), Arc::new(transport), Arc::new(TokioSleeper))
    }

    #[tokio::test]
    async fn a_well_formed_content_payload_is_returned() {
        let client = client(ScriptedTransport::new(vec![envelope_response(r#"{"ok":true}"#)]));
        let value = client.chat_completion("analyze this", CallParams::default()).await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn invalid_content_json_is_retried_then_exhausted() {
        let client = client(ScriptedTransport::new(vec![envelope_response("not json"), envelope_response("still not json"), envelope_response("nope")]));
        let error = client.chat_completion("analyze this", CallParams::default()).await.unwrap_err();
        match error {
            LlmClientError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, MAX_ATTEMPTS),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_non_2xx_non_429_status_fails_immediately() {
        let client = client(ScriptedTransport::new(vec![HttpResponse { status: 400, headers: BTreeMap::new(), body: b"bad request".to_vec() }]));
        let error = client.chat_completion("analyze this", CallParams::default()).await.unwrap_err();
        match error {
            LlmClientError::Status { status, .. } => assert_eq!(status, 400),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_429_is_retried_and_can_then_succeed() {
        let client = client(ScriptedTransport::new(vec![
            HttpResponse { status: 429, headers: BTreeMap::new(), body: Vec::new() },
            envelope_response(r#"{"ok":true}"#),
        ]));
        let value = client.chat_completion("analyze this", CallParams::default()).await.unwrap();
        assert_eq!(value["ok"], true);
    }
}
