// crates/scout-http/src/client.rs
// ============================================================================
// Module: GitHub Client
// Description: Cache-then-revalidate, rate-limited, backing-off GitHub REST
//              client.
// Purpose: The single place every other crate goes through to talk to
//          GitHub (spec.md §4.C).
// Dependencies: scout-core, scout-store-sqlite, tokio, tracing
// ============================================================================

//! ## Overview
//! [`GithubClient::fetch`] is the one call-site every endpoint method below
//! routes through. It, in order: acquires a token-bucket slot, checks the
//! cache and attaches conditional-GET headers, sends the request, and
//! applies the upstream backoff policy on `429`/`403`/`5xx`. Everything else
//! in this module is plumbing around that one method.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use scout_core::Clock;
use scout_core::HttpCacheEntry;
use scout_core::HttpMethod;
use scout_core::HttpRequest;
use scout_core::HttpResponse;
use scout_core::RateLimitBucket;
use scout_core::RepoId;
use scout_core::Sleeper;
use scout_core::Timestamp;
use scout_core::Transport;
use scout_core::hashing::http_cache_key;
use scout_store_sqlite::Store;

use crate::cache;
use crate::errors::HttpClientError;
use crate::rate_limit::TokenBucket;
use crate::util::build_url;

/// Default `Accept` header, per `spec.md` §4.C.
const DEFAULT_ACCEPT: &str = "application/vnd.github+json";

/// Retries permitted for `429`/`403` before failing with
/// [`HttpClientError::RateLimited`].
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Total attempts permitted for `5xx` before failing with
/// [`HttpClientError::Status`] (once `5xx` retries are exhausted).
const MAX_SERVER_ERROR_TRIES: u32 = 3;

/// Fallback wait when neither `Retry-After` nor `X-RateLimit-Reset` is present.
const FALLBACK_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Throttle events
// ============================================================================

/// Why a throttle wait happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleReason {
    /// The local token bucket had no tokens available.
    TokenBucketEmpty,
    /// Upstream returned `429 Too Many Requests`.
    RateLimit429,
    /// Upstream returned `403` with a secondary rate-limit signal.
    SecondaryRateLimit403,
}

impl ThrottleReason {
    /// Canonical reason code, as emitted in audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TokenBucketEmpty => "token_bucket_empty",
            Self::RateLimit429 => "rate_limit_429",
            Self::SecondaryRateLimit403 => "secondary_rate_limit_403",
        }
    }
}

/// A throttle wait, reported to the injectable callback.
#[derive(Debug, Clone)]
pub struct ThrottleEvent {
    /// Which bucket this request was drawn from.
    pub bucket: RateLimitBucket,
    /// How long the client waited, in milliseconds.
    pub wait_ms: u64,
    /// Why the wait happened.
    pub reason: ThrottleReason,
    /// The upstream-reported reset time, when known.
    pub observed_reset: Option<Timestamp>,
}

type ThrottleCallback = dyn Fn(&ThrottleEvent) + Send + Sync;

// ============================================================================
// SECTION: Request / Response
// ============================================================================

/// A logical GitHub API request, independent of caching and rate limiting.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Path relative to the base URL, e.g. `/search/repositories`.
    pub path: String,
    /// Ordered query parameters, encoded by [`crate::util::build_url`].
    pub query: Vec<(&'static str, String)>,
    /// `Accept` header override. Defaults to the GitHub JSON media type.
    pub accept: Option<String>,
    /// Which token bucket this request draws from.
    pub bucket: RateLimitBucket,
}

impl RequestSpec {
    /// Builds a bare request for `path` against `bucket`, with no query
    /// parameters and the default accept header.
    #[must_use]
    pub fn new(path: impl Into<String>, bucket: RateLimitBucket) -> Self {
        Self { path: path.into(), query: Vec::new(), accept: None, bucket }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    /// Overrides the `Accept` header.
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// A parsed response body: JSON when the payload parses, raw text otherwise
/// (`spec.md` §4.C: "Response body is parsed as JSON when possible,
/// otherwise returned as raw text.").
#[derive(Debug, Clone)]
pub enum ResponseBody {
    /// Successfully parsed JSON payload.
    Json(serde_json::Value),
    /// Raw text, kept as-is because it did not parse as JSON.
    Text(String),
}

impl ResponseBody {
    /// Returns the parsed JSON value, if this body parsed as JSON.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// The result of a successful [`GithubClient::fetch`] call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status, normalized to `200` for cache hits revalidated via `304`.
    pub status: u16,
    /// The parsed response body.
    pub body: ResponseBody,
    /// Whether this response was served from the local cache.
    pub from_cache: bool,
    /// `ETag` header, if the upstream response (or the cache entry it
    /// revalidated against) carried one. Callers that persist a source
    /// entity-tag (e.g. the README hydration step) read it from here.
    pub etag: Option<String>,
}

fn parse_body(bytes: &[u8]) -> ResponseBody {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => ResponseBody::Json(value),
        Err(_) => ResponseBody::Text(String::from_utf8_lossy(bytes).to_string()),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

// ============================================================================
// SECTION: Client configuration
// ============================================================================

/// Static configuration for a [`GithubClient`]: base URL and the headers
/// injected on every request (`spec.md` §4.C: "Base URL and mandatory
/// headers (auth bearer, API version, user-agent) are injected once.").
#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    /// API base URL, with no trailing slash required.
    pub base_url: String,
    /// Bearer token, attached as `Authorization: Bearer <token>` when present.
    pub token: Option<String>,
    /// `X-GitHub-Api-Version` header value.
    pub api_version: String,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl GithubClientConfig {
    /// Builds a config pointed at the public GitHub API.
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: None,
            api_version: "2022-11-28".to_string(),
            user_agent: user_agent.into(),
        }
    }

    /// Attaches a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overrides the base URL (used in tests against a fake transport).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ============================================================================
// SECTION: GithubClient
// ============================================================================

/// Cache-then-revalidate, rate-limited GitHub REST client.
pub struct GithubClient {
    transport: Arc<dyn Transport>,
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    config: GithubClientConfig,
    search_bucket: TokenBucket,
    core_bucket: TokenBucket,
    on_throttle: Option<Arc<ThrottleCallback>>,
}

impl GithubClient {
    /// Builds a client with both token buckets starting full.
    #[must_use]
    pub fn new(
        config: GithubClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let search_bucket = TokenBucket::new(RateLimitBucket::Search, Arc::clone(&clock), Arc::clone(&sleeper));
        let core_bucket = TokenBucket::new(RateLimitBucket::Core, Arc::clone(&clock), Arc::clone(&sleeper));
        Self { transport, store, clock, sleeper, config, search_bucket, core_bucket, on_throttle: None }
    }

    /// Registers a callback invoked on every throttle wait.
    #[must_use]
    pub fn with_throttle_callback(mut self, callback: impl Fn(&ThrottleEvent) + Send + Sync + 'static) -> Self {
        self.on_throttle = Some(Arc::new(callback));
        self
    }

    /// `GET /rate_limit` on the core bucket.
    ///
    /// # Errors
    ///
    /// See [`GithubClient::fetch`].
    pub async fn rate_limit(&self) -> Result<ApiResponse, HttpClientError> {
        self.fetch(RequestSpec::new("/rate_limit", RateLimitBucket::Core)).await
    }

    /// `GET /search/repositories?q=...` on the search bucket.
    ///
    /// # Errors
    ///
    /// See [`GithubClient::fetch`].
    pub async fn search_repositories(&self, query: &str, page: u32) -> Result<ApiResponse, HttpClientError> {
        let spec = RequestSpec::new("/search/repositories", RateLimitBucket::Search)
            .with_query("q", query.to_string())
            .with_query("page", page.to_string())
            .with_query("per_page", "100");
        self.fetch(spec).await
    }

    /// `GET /repos/{owner}/{name}/readme` on the core bucket, requesting the
    /// raw media type so the response body is README bytes, not a JSON
    /// envelope.
    ///
    /// # Errors
    ///
    /// See [`GithubClient::fetch`].
    pub async fn repo_readme(&self, repo_id: &RepoId) -> Result<ApiResponse, HttpClientError> {
        let path = format!("/repos/{}/readme", repo_id.as_str());
        let spec = RequestSpec::new(path, RateLimitBucket::Core).with_accept("application/vnd.github.raw");
        self.fetch(spec).await
    }

    /// Runs the full cache / rate-limit / backoff pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::Transport`] on a connection-level failure,
    /// [`HttpClientError::RateLimited`] or
    /// [`HttpClientError::Status`] (once `5xx` retries are exhausted) when retries are used up,
    /// [`HttpClientError::Status`] for any other non-2xx, and
    /// [`HttpClientError::Store`] on a cache read/write failure.
    pub async fn fetch(&self, spec: RequestSpec) -> Result<ApiResponse, HttpClientError> {
        let bucket = self.bucket_for(spec.bucket);
        let waited = bucket.acquire().await;
        if waited > Duration::ZERO {
            self.emit_throttle(ThrottleEvent {
                bucket: spec.bucket,
                wait_ms: duration_to_millis(waited),
                reason: ThrottleReason::TokenBucketEmpty,
                observed_reset: None,
            });
        }

        let accept = spec.accept.clone().unwrap_or_else(|| DEFAULT_ACCEPT.to_string());
        let url = build_url(&self.config.base_url, &spec.path, &spec.query);
        let cache_key = http_cache_key("GET", &url, &accept);
        let cached = cache::get(&self.store, cache_key.clone()).await?;

        let mut rate_limit_attempts: u32 = 0;
        let mut server_error_attempts: u32 = 0;
        loop {
            let request = self.build_request(&url, &accept, cached.as_ref());
            let response = self.transport.send(request).await?;
            match response.status {
                304 => return self.handle_not_modified(&cache_key, cached).await,
                200..=299 => return self.handle_success(&cache_key, &url, &response).await,
                429 | 403 => {
                    rate_limit_attempts += 1;
                    if rate_limit_attempts > MAX_RATE_LIMIT_RETRIES {
                        return Err(HttpClientError::RateLimited {
                            bucket: spec.bucket.as_str(),
                            attempts: rate_limit_attempts - 1,
                        });
                    }
                    let reason = if response.status == 429 { ThrottleReason::RateLimit429 } else { ThrottleReason::SecondaryRateLimit403 };
                    let wait = self.compute_rate_limit_wait(&response);
                    self.emit_throttle(ThrottleEvent {
                        bucket: spec.bucket,
                        wait_ms: duration_to_millis(wait.0),
                        reason,
                        observed_reset: wait.1,
                    });
                    self.sleeper.sleep(wait.0).await;
                }
                500..=599 => {
                    server_error_attempts += 1;
                    if server_error_attempts >= MAX_SERVER_ERROR_TRIES {
                        let body = String::from_utf8_lossy(&response.body).to_string();
                        return Err(HttpClientError::Status { status: response.status, body });
                    }
                    let wait = Duration::from_secs(2u64.saturating_pow(server_error_attempts));
                    self.sleeper.sleep(wait).await;
                }
                _ => {
                    let body = String::from_utf8_lossy(&response.body).to_string();
                    return Err(HttpClientError::Status { status: response.status, body });
                }
            }
        }
    }

    fn bucket_for(&self, bucket: RateLimitBucket) -> &TokenBucket {
        match bucket {
            RateLimitBucket::Search => &self.search_bucket,
            RateLimitBucket::Core => &self.core_bucket,
        }
    }

    fn build_request(&self, url: &str, accept: &str, cached: Option<&HttpCacheEntry>) -> HttpRequest {
        let mut headers = BTreeMap::new();
        headers.insert("accept".to_string(), accept.to_string());
        headers.insert("user-agent".to_string(), self.config.user_agent.clone());
        headers.insert("x-github-api-version".to_string(), self.config.api_version.clone());
        if let Some(token) = &self.config.token {
            headers.insert("authorization".to_string(), format!("Bearer {token}"));
        }
        if let Some(entry) = cached {
            if let Some(etag) = &entry.etag {
                headers.insert("if-none-match".to_string(), etag.clone());
            } else if let Some(last_modified) = &entry.last_modified {
                headers.insert("if-modified-since".to_string(), last_modified.clone());
            }
        }
        HttpRequest { method: HttpMethod::Get, url: url.to_string(), headers, body: None }
    }

    async fn handle_not_modified(&self, cache_key: &str, cached: Option<HttpCacheEntry>) -> Result<ApiResponse, HttpClientError> {
        let entry = cached.ok_or_else(|| HttpClientError::Json("304 response with no matching cache entry".to_string()))?;
        let now = self.clock.now();
        cache::touch(&self.store, cache_key.to_string(), now, entry.expires_at).await?;
        let etag = entry.etag.clone();
        Ok(ApiResponse { status: 200, body: parse_body(&entry.body), from_cache: true, etag })
    }

    async fn handle_success(&self, cache_key: &str, url: &str, response: &HttpResponse) -> Result<ApiResponse, HttpClientError> {
        let now = self.clock.now();
        let entry = HttpCacheEntry {
            cache_key: cache_key.to_string(),
            method: "GET".to_string(),
            url: url.to_string(),
            status: response.status,
            etag: response.header("etag").map(str::to_string),
            last_modified: response.header("last-modified").map(str::to_string),
            body: response.body.clone(),
            fetched_at: now,
            expires_at: None,
        };
        let etag = entry.etag.clone();
        cache::upsert(&self.store, entry).await?;
        Ok(ApiResponse { status: response.status, body: parse_body(&response.body), from_cache: false, etag })
    }

    /// Computes the wait for a `429`/`403`, per `spec.md` §4.C: `Retry-After`
    /// seconds, else `X-RateLimit-Reset` epoch seconds plus a one-second
    /// buffer, else sixty seconds.
    fn compute_rate_limit_wait(&self, response: &HttpResponse) -> (Duration, Option<Timestamp>) {
        if let Some(retry_after) = response.header("retry-after").and_then(|value| value.trim().parse::<u64>().ok()) {
            return (Duration::from_secs(retry_after), None);
        }
        if let Some(reset) = response.header("x-ratelimit-reset").and_then(|value| value.trim().parse::<i64>().ok()) {
            let reset_at = Timestamp::from_epoch_millis(reset.saturating_mul(1000));
            let now_secs = self.clock.now().epoch_seconds();
            let wait_secs = (reset - now_secs).max(0) + 1;
            #[allow(clippy::cast_sign_loss)]
            return (Duration::from_secs(wait_secs as u64), Some(reset_at));
        }
        (FALLBACK_RATE_LIMIT_WAIT, None)
    }

    fn emit_throttle(&self, event: ThrottleEvent) {
        if let Some(callback) = &self.on_throttle {
            callback(&event);
        }
        tracing::debug!(bucket = event.bucket.as_str(), wait_ms = event.wait_ms, reason = event.reason.as_str(), "throttled");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use std::sync::Mutex as StdMutex;

    use scout_core::SystemClock;
    use scout_core::TokioSleeper;
    use scout_core::TransportError;

    use super::*;

    struct ScriptedTransport {
        responses: StdMutex<Vec<HttpResponse>>,
        seen: StdMutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self { responses: StdMutex::new(responses), seen: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(TransportError("scripted transport exhausted".to_string()));
            }
            Ok(responses.remove(0))
        }
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse { status, headers: BTreeMap::new(), body: body.as_bytes().to_vec() }
    }

    fn client(transport: ScriptedTransport) -> GithubClient {
        let store = Arc::new(scout_store_sqlite::Store::open_in_memory().unwrap());
        GithubClient::new(
            GithubClientConfig::new("collaboration-scout/test"),
            Arc::new(transport),
            store,
            Arc::new(SystemClock),
            Arc::new(TokioSleeper),
        )
    }

    #[tokio::test]
    async fn a_fresh_2xx_response_is_cached_and_returned() {
        let client = client(ScriptedTransport::new(vec![json_response(200, r#"{"ok":true}"#)]));
        let response = client.rate_limit().await.unwrap();
        assert_eq!(response.status, 200);
        assert!(!response.from_cache);
        assert_eq!(response.body.as_json().unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn a_non_2xx_non_retriable_status_fails_immediately() {
        let client = client(ScriptedTransport::new(vec![json_response(404, "not found")]));
        let error = client.rate_limit().await.unwrap_err();
        match error {
            HttpClientError::Status { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_retries_are_exhausted_after_three_retries() {
        let responses = (0..5).map(|_| json_response(429, "rate limited")).collect();
        let client = client(ScriptedTransport::new(responses));
        let error = client.rate_limit().await.unwrap_err();
        match error {
            HttpClientError::RateLimited { attempts, .. } => assert_eq!(attempts, MAX_RATE_LIMIT_RETRIES),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_stop_after_three_tries() {
        let responses = (0..5).map(|_| json_response(503, "unavailable")).collect();
        let client = client(ScriptedTransport::new(responses));
        let error = client.rate_limit().await.unwrap_err();
        match error {
            HttpClientError::Status { status: 503, .. } => {}
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_304_response_returns_the_cached_body_as_status_200() {
        let store = Arc::new(scout_store_sqlite::Store::open_in_memory().unwrap());
        let first = client_with_store(Arc::clone(&store), ScriptedTransport::new(vec![{
            let mut response = json_response(200, r#"{"cached":true}"#);
            response.headers.insert("etag".to_string(), "\"v1\"".to_string());
            response
        }]));
        first.rate_limit().await.unwrap();

        let second = client_with_store(store, ScriptedTransport::new(vec![HttpResponse { status: 304, headers: BTreeMap::new(), body: Vec::new() }]));
        let response = second.rate_limit().await.unwrap();
        assert_eq!(response.status, 200);
        assert!(response.from_cache);
        assert_eq!(response.body.as_json().unwrap()["cached"], true);
    }

    fn client_with_store(store: Arc<scout_store_sqlite::Store>, transport: ScriptedTransport) -> GithubClient {
        GithubClient::new(
            GithubClientConfig::new("collaboration-scout/test"),
            Arc::new(transport),
            store,
            Arc::new(SystemClock),
            Arc::new(TokioSleeper),
        )
    }
}
