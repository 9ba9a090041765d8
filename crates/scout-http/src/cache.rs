// crates/scout-http/src/cache.rs
// ============================================================================
// Module: HTTP Cache Bridge
// Description: Async wrappers around the synchronous `HttpCacheDao`.
// Purpose: Keep `rusqlite` off the async call stack, per
//          `scout-store-sqlite`'s documented `spawn_blocking` convention.
// Dependencies: scout-core, scout-store-sqlite, tokio
// ============================================================================

use std::sync::Arc;

use scout_core::HttpCacheEntry;
use scout_core::Timestamp;
use scout_store_sqlite::HttpCacheDao;
use scout_store_sqlite::Store;

use crate::errors::HttpClientError;

/// Looks up a cache entry by key, off the async executor thread.
pub(crate) async fn get(store: &Arc<Store>, cache_key: String) -> Result<Option<HttpCacheEntry>, HttpClientError> {
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || store.with_transaction(|tx| HttpCacheDao::get(tx, &cache_key)))
        .await
        .map_err(|err| HttpClientError::Join(err.to_string()))?
        .map_err(HttpClientError::from)
}

/// Upserts a fresh `2xx` response into the cache, off the async executor thread.
pub(crate) async fn upsert(store: &Arc<Store>, entry: HttpCacheEntry) -> Result<(), HttpClientError> {
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || store.with_transaction(|tx| HttpCacheDao::upsert(tx, &entry)))
        .await
        .map_err(|err| HttpClientError::Join(err.to_string()))?
        .map_err(HttpClientError::from)
}

/// Advances `fetched_at` for a `304` response, off the async executor thread.
pub(crate) async fn touch(
    store: &Arc<Store>,
    cache_key: String,
    fetched_at: Timestamp,
    expires_at: Option<Timestamp>,
) -> Result<(), HttpClientError> {
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || store.with_transaction(|tx| HttpCacheDao::touch(tx, &cache_key, fetched_at, expires_at)))
        .await
        .map_err(|err| HttpClientError::Join(err.to_string()))?
        .map_err(HttpClientError::from)
}
