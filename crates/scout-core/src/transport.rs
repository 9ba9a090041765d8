// crates/scout-core/src/transport.rs
// ============================================================================
// Module: Injectable HTTP Transport
// Description: The minimal async HTTP surface shared by the GitHub client and
//              the LLM client.
// Purpose: Let both clients swap in a canned responder for tests without
//          depending on a network-mocking crate.
// Dependencies: async-trait
// ============================================================================

//! ## Overview
//! `scout-http` and `scout-llm` both need to: send a request with a method,
//! URL, headers, and optional body; and get back a status, headers, and raw
//! body bytes. That is the entire contract below. Retry policy, caching, and
//! rate limiting are layered on top by each client; none of that logic lives
//! here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

// ============================================================================
// SECTION: Request / Response
// ============================================================================

/// HTTP method used for a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
}

impl HttpMethod {
    /// Returns the canonical uppercase method name, as used in cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A fully-formed outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Fully-qualified URL.
    pub url: String,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

/// A transport-level HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (header names are lowercased).
    pub headers: BTreeMap<String, String>,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns a header value by lowercase name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Transport-level failure (DNS, connect, TLS, I/O — never a non-2xx status,
/// which callers observe via [`HttpResponse::status`] instead).
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Injectable HTTP transport.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] for connection-level failures. Non-2xx
    /// status codes are returned as an `Ok` response for the caller's retry
    /// policy to interpret.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
