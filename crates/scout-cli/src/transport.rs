// crates/scout-cli/src/transport.rs
// ============================================================================
// Module: Reqwest Transport
// Description: Production `Transport` impl backed by a real `reqwest::Client`.
// Purpose: Wire `scout-http`'s `GithubClient` and `scout-llm`'s `LlmClient`
//          onto the network (spec.md §6).
// Dependencies: reqwest, scout-core
// ============================================================================

//! ## Overview
//! Every other `Transport` in this workspace is a test double. This is the
//! one that actually calls the network, translating `scout_core`'s
//! transport-agnostic request/response types to and from `reqwest`.
//! Retries, caching, and rate limiting all live above this in `scout-http`
//! and `scout-llm`; this module's only job is to move bytes.

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use scout_core::HttpMethod;
use scout_core::HttpRequest;
use scout_core::HttpResponse;
use scout_core::Transport;
use scout_core::TransportError;

/// Hard ceiling on a response body, so a misbehaving server cannot exhaust
/// memory.
const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// `Transport` implementation backed by a real `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a transport with a 30 second request timeout and no automatic
    /// redirect following (GitHub and OpenRouter never redirect API calls;
    /// a redirect here is more likely a misconfigured URL than a genuine
    /// move).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(Policy::none())
            .build()
            .map_err(|err| TransportError(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| TransportError(err.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_ascii_lowercase(), value.to_str().unwrap_or_default().to_string()))
            .collect();

        let body = read_body_with_limit(response, MAX_RESPONSE_BYTES).await?;
        Ok(HttpResponse { status, headers, body })
    }
}

async fn read_body_with_limit(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|err| TransportError(err.to_string()))? {
        let total = body.len().checked_add(chunk.len()).ok_or_else(|| TransportError("response body overflowed usize".to_string()))?;
        if total > limit {
            return Err(TransportError(format!("response body exceeded {limit} byte limit")));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
