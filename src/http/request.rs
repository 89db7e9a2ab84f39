//! Request parsing and identification.
//!
//! # Responsibilities
//! - Map request paths and query strings to a `ResourceKey`
//! - Attach the request ID to the per-request tracing span
//!
//! # Design Decisions
//! - Malformed keys fail before any cache or upstream work
//! - Request ID added as early as possible for tracing

use axum::body::Body;
use axum::http::Request;
use serde::Deserialize;
use tracing::Span;

use crate::config::DefaultResourceConfig;
use crate::error::{FetchError, FetchResult};
use crate::upstream::{ResourceKey, ResourceKind};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Query parameters accepted at `/`.
#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub kind: Option<String>,
}

/// Build a key from the decoded segments of `/repos/{owner}/{repo}[/{kind}]`.
///
/// Each segment is decoded on its own, so an escaped `/` stays inside its
/// segment and fails name validation.
pub fn key_from_segments(owner: &str, repo: &str, kind: Option<&str>) -> FetchResult<ResourceKey> {
    let kind = match kind {
        Some(kind) => kind.parse()?,
        None => ResourceKind::Issues,
    };
    ResourceKey::new(owner, repo, kind)
}

/// Explain why a `/repos` path matched none of the collection routes.
pub fn reject_repos_path(path: &str) -> FetchError {
    let tail = path.strip_prefix("/repos").unwrap_or(path).trim_start_matches('/');
    let segments: Vec<&str> = tail.split('/').collect();
    match segments.as_slice() {
        [""] | ["", ..] => FetchError::BadRequest("missing owner name".into()),
        [_owner] | [_owner, ""] => FetchError::BadRequest("missing repository name".into()),
        _ => FetchError::BadRequest(format!("unrecognized resource path '/repos/{}'", tail)),
    }
}

/// Whether `path` lies under the `/repos` collection prefix.
pub fn is_repos_path(path: &str) -> bool {
    path == "/repos" || path.starts_with("/repos/")
}

/// Resolve `/` query parameters against the configured default resource.
pub fn key_from_query(query: &KeyQuery, default: &DefaultResourceConfig) -> FetchResult<ResourceKey> {
    let kind = match query.kind.as_deref() {
        Some(kind) => kind.parse()?,
        None => default.kind,
    };
    match (query.owner.as_deref(), query.repo.as_deref()) {
        (None, None) => ResourceKey::new(&default.owner, &default.repo, kind),
        (Some(owner), Some(repo)) => ResourceKey::new(owner, repo, kind),
        (Some(_), None) => Err(FetchError::BadRequest("missing repository name".into())),
        (None, Some(_)) => Err(FetchError::BadRequest("missing owner name".into())),
    }
}

/// Span for one inbound request, tagged with its request ID.
pub fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}
