//! Error taxonomy shared by the upstream client, deduplicator and handler.
//!
//! # Design Decisions
//! - One enum for every layer; only the HTTP layer maps kinds to status codes
//! - `Clone` so a single fetch outcome can be fanned out to every waiter
//! - Upstream errors pass through the deduplicator unchanged

use std::time::Duration;
use thiserror::Error;

/// Errors produced while resolving a collection request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The inbound request could not be mapped to a resource key.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream reports the resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Upstream rate limit hit; the caller owns backoff.
    #[error("upstream rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Network failure, timeout, or upstream server error.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Upstream refused the request or returned an unusable payload.
    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FetchError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::BadRequest(_) => "bad_request",
            FetchError::NotFound(_) => "not_found",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::Unavailable(_) => "unavailable",
            FetchError::UpstreamRejected(_) => "upstream_rejected",
            FetchError::Internal(_) => "internal",
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
