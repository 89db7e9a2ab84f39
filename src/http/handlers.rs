//! Request handlers.
//!
//! Control flow for a collection request:
//! ```text
//! parse key ──(malformed)──▶ 400
//!     │
//!     ▼
//! cache.get ──(fresh)──▶ 200 X-Cache: HIT
//!     │ miss
//!     ▼
//! dedup.get_or_fetch ──▶ fetch_all ──▶ cache.put ──▶ 200 X-Cache: MISS
//!     │ error
//!     ▼
//! stale entry + stale_on_error ──▶ 200 X-Cache: STALE, otherwise mapped error
//! ```
//!
//! Any 200 above becomes a 304 when `If-None-Match` names the served version.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::dedup::DedupStats;
use crate::error::{FetchError, FetchResult};
use crate::http::request::{is_repos_path, key_from_query, key_from_segments, reject_repos_path, KeyQuery};
use crate::http::response::{conditional_response, CacheStatus};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::upstream::{fetch_all, ResourceKey};

/// `GET /repos/{owner}/{repo}`
pub async fn get_issues(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    respond(&state, key_from_segments(&owner, &repo, None), &headers).await
}

/// `GET /repos/{owner}/{repo}/{kind}`
pub async fn get_collection(
    State(state): State<AppState>,
    Path((owner, repo, kind)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    respond(&state, key_from_segments(&owner, &repo, Some(&kind)), &headers).await
}

/// `GET /`, defaulting to the configured resource.
pub async fn get_default_collection(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Response {
    let key = key_from_query(&query, &state.default_resource);
    respond(&state, key, &headers).await
}

/// Requests matching no route. Malformed `/repos` paths are a 400.
pub async fn unmatched(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path();
    if is_repos_path(path) {
        return respond(&state, Err(reject_repos_path(path)), &headers).await;
    }
    FetchError::NotFound(format!("no route for {}", path)).into_response()
}

async fn respond(state: &AppState, key: FetchResult<ResourceKey>, headers: &HeaderMap) -> Response {
    let start = Instant::now();
    let response = match key {
        Ok(key) => serve_collection(state, key, headers).await,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed request");
            e.into_response()
        }
    };
    metrics::record_request(response.status().as_u16(), start);
    response
}

async fn serve_collection(state: &AppState, key: ResourceKey, headers: &HeaderMap) -> Response {
    if let Some(entry) = state.cache.get(&key) {
        tracing::debug!(key = %key, version = entry.version, "Serving from cache");
        return conditional_response(headers, &entry, CacheStatus::Hit);
    }

    let client = state.client.clone();
    let cache = state.cache.clone();
    let max_pages = state.max_pages;
    let fetch_key = key.clone();

    // The cache is written inside the fetch task so it is populated even if
    // this request is cancelled while waiting.
    let result = state
        .dedup
        .get_or_fetch(key.clone(), move || async move {
            let records = fetch_all(client.as_ref(), &fetch_key, max_pages).await?;
            Ok(cache.put(fetch_key, records))
        })
        .await;

    match result {
        Ok(entry) => conditional_response(headers, &entry, CacheStatus::Miss),
        Err(e) => {
            if state.stale_on_error {
                if let Some(stale) = state.cache.get_stale(&key) {
                    tracing::warn!(
                        key = %key,
                        version = stale.version,
                        error = %e,
                        "Refresh failed, serving stale entry"
                    );
                    metrics::record_cache_event("stale");
                    return conditional_response(headers, &stale, CacheStatus::Stale);
                }
            }
            tracing::warn!(key = %key, error = %e, "Collection request failed");
            e.into_response()
        }
    }
}

/// Runtime statistics for operators.
#[derive(Debug, Serialize)]
pub struct ServiceStats {
    pub cache: CacheStats,
    pub dedup: DedupStats,
}

/// `GET /stats`
pub async fn get_stats(State(state): State<AppState>) -> Json<ServiceStats> {
    Json(ServiceStats {
        cache: state.cache.stats(),
        dedup: state.dedup.stats(),
    })
}

/// `GET /healthz`
pub async fn health() -> &'static str {
    "ok"
}
