//! Response construction.
//!
//! # Responsibilities
//! - Serialize cached collections with version and staleness headers
//! - Map `FetchError` kinds to status codes (the only place this happens)
//!
//! # Design Decisions
//! - Records are passed through unchanged as a JSON array
//! - `ETag` carries the cache version; `X-Cache` says where the body came from
//! - Internal error details stay in the logs

use axum::http::header::{AGE, ETAG, IF_NONE_MATCH, RETRY_AFTER};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::cache::CacheEntry;
use crate::error::FetchError;

/// Header reporting whether the body was served from cache.
pub const X_CACHE: &str = "x-cache";

/// Where a collection response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Stale => "STALE",
        }
    }
}

/// Strong ETag for a cache entry.
pub fn etag(entry: &CacheEntry) -> String {
    format!("\"{}\"", entry.version)
}

/// Whether the client already holds this entry's version.
pub fn matches_if_none_match(headers: &HeaderMap, entry: &CacheEntry) -> bool {
    let current = etag(entry);
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|tag| tag.trim().trim_start_matches("W/"))
        .any(|tag| tag == "*" || tag == current)
}

fn insert_entry_headers(headers: &mut HeaderMap, entry: &CacheEntry, status: CacheStatus) {
    if let Ok(value) = HeaderValue::from_str(&etag(entry)) {
        headers.insert(ETAG, value);
    }
    headers.insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    headers.insert(AGE, HeaderValue::from(entry.age().as_secs()));
}

/// 200 with the entry's records as a JSON array.
pub fn collection_response(entry: &CacheEntry, status: CacheStatus) -> Response {
    let mut response = Json(entry.records.as_slice()).into_response();
    insert_entry_headers(response.headers_mut(), entry, status);
    response
}

/// 304 for a conditional request whose ETag is still current.
pub fn not_modified(entry: &CacheEntry, status: CacheStatus) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    insert_entry_headers(response.headers_mut(), entry, status);
    response
}

/// 304 when the request's `If-None-Match` names this entry, otherwise 200.
pub fn conditional_response(headers: &HeaderMap, entry: &CacheEntry, status: CacheStatus) -> Response {
    if matches_if_none_match(headers, entry) {
        not_modified(entry, status)
    } else {
        collection_response(entry, status)
    }
}

/// Status code for an error kind.
pub fn status_for(err: &FetchError) -> StatusCode {
    match err {
        FetchError::BadRequest(_) => StatusCode::BAD_REQUEST,
        FetchError::NotFound(_) => StatusCode::NOT_FOUND,
        FetchError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        FetchError::Unavailable(_) | FetchError::UpstreamRejected(_) => StatusCode::BAD_GATEWAY,
        FetchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let message = match &self {
            FetchError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let FetchError::RateLimited { retry_after } = &self {
            // Round up so clients never retry early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn entry(version: u64) -> CacheEntry {
        CacheEntry {
            records: Arc::new(vec![json!({ "number": 1 })]),
            fetched_at: Instant::now(),
            version,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&FetchError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&FetchError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&FetchError::RateLimited { retry_after: Duration::from_secs(1) }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status_for(&FetchError::Unavailable("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&FetchError::UpstreamRejected("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&FetchError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = FetchError::RateLimited {
            retry_after: Duration::from_secs(30),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "30");

        let response = FetchError::RateLimited {
            retry_after: Duration::from_millis(1500),
        }
        .into_response();
        assert_eq!(response.headers()[RETRY_AFTER], "2");
    }

    #[tokio::test]
    async fn test_collection_response_headers() {
        let response = collection_response(&entry(7), CacheStatus::Miss);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ETAG], "\"7\"");
        assert_eq!(response.headers()[X_CACHE], "MISS");
        assert_eq!(response.headers()[AGE], "0");
    }

    #[tokio::test]
    async fn test_if_none_match() {
        let entry = entry(3);
        let mut headers = HeaderMap::new();
        assert!(!matches_if_none_match(&headers, &entry));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"2\", \"3\""));
        assert!(matches_if_none_match(&headers, &entry));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("W/\"3\""));
        assert!(matches_if_none_match(&headers, &entry));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"4\""));
        assert!(!matches_if_none_match(&headers, &entry));
    }

    #[tokio::test]
    async fn test_conditional_response_keeps_cache_status() {
        let entry = entry(4);
        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"4\""));

        let response = conditional_response(&headers, &entry, CacheStatus::Stale);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[X_CACHE], "STALE");
        assert_eq!(response.headers()[ETAG], "\"4\"");

        let response = conditional_response(&HeaderMap::new(), &entry, CacheStatus::Miss);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_CACHE], "MISS");
    }
}
