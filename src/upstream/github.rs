//! GitHub REST client for repository collections.
//!
//! # Responsibilities
//! - Build collection URLs for a `ResourceKey`
//! - Follow `Link: rel="next"` pagination
//! - Translate status codes and rate-limit headers into `FetchError`
//!
//! # Design Decisions
//! - The request deadline is the reqwest client timeout
//! - Next-page URLs must stay on the configured origin so the token never leaks

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, RETRY_AFTER};
use reqwest::StatusCode;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{FetchError, FetchResult};
use crate::upstream::client::UpstreamClient;
use crate::upstream::types::{Page, PageCursor, RateLimitInfo, Record, ResourceKey};

const API_VERSION: &str = "2022-11-28";
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Upstream client for `api.github.com` (or a compatible base URL).
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: Url,
    per_page: u32,
}

impl GitHubClient {
    /// Create a client from upstream configuration.
    pub fn new(config: &UpstreamConfig) -> FetchResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            FetchError::Internal(format!("invalid upstream base URL '{}': {}", config.base_url, e))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| FetchError::Internal("upstream token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Internal(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(
            base_url = %base_url,
            authenticated = config.token.as_deref().is_some_and(|t| !t.is_empty()),
            timeout_secs = config.timeout_secs,
            "GitHub client initialized"
        );

        Ok(Self {
            http,
            base_url,
            per_page: config.per_page,
        })
    }

    /// URL of the first page of a collection.
    fn first_page_url(&self, key: &ResourceKey) -> FetchResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Internal(format!("base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["repos", key.owner(), key.repo(), key.kind().as_str()]);
        url.query_pairs_mut()
            .append_pair("state", "open")
            .append_pair("per_page", &self.per_page.to_string());
        Ok(url)
    }

    fn cursor_url(&self, cursor: &PageCursor) -> FetchResult<Url> {
        let url = Url::parse(&cursor.0)
            .map_err(|e| FetchError::UpstreamRejected(format!("malformed next-page link: {}", e)))?;
        if url.origin() != self.base_url.origin() {
            return Err(FetchError::UpstreamRejected(format!(
                "next-page link points at foreign origin {}",
                url.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }
}

#[async_trait]
impl UpstreamClient for GitHubClient {
    async fn fetch_page(&self, key: &ResourceKey, cursor: Option<&PageCursor>) -> FetchResult<Page> {
        let url = match cursor {
            Some(cursor) => self.cursor_url(cursor)?,
            None => self.first_page_url(key)?,
        };

        tracing::debug!(key = %key, url = %url, "Requesting upstream page");

        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let rate_limit = parse_rate_limit(&headers);

        if !status.is_success() {
            let err = classify_status(status, &headers, SystemTime::now());
            tracing::warn!(key = %key, status = %status, error = %err, "Upstream returned error status");
            return Err(match err {
                FetchError::NotFound(_) => FetchError::NotFound(key.to_string()),
                other => other,
            });
        }

        let records: Vec<Record> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Unavailable(format!("upstream body timed out: {}", e))
            } else {
                FetchError::UpstreamRejected(format!("undecodable upstream payload: {}", e))
            }
        })?;

        let next = headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link)
            .map(PageCursor);

        Ok(Page {
            records,
            next,
            rate_limit,
        })
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url.as_str())
            .field("per_page", &self.per_page)
            .finish()
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::Internal(format!("failed to build upstream request: {}", e))
    } else {
        FetchError::Unavailable(e.to_string())
    }
}

/// Map a non-success upstream status to an error kind.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, now: SystemTime) -> FetchError {
    let budget_exhausted = header_u64(headers, "x-ratelimit-remaining") == Some(0);
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
            retry_after: retry_after(headers, now),
        },
        StatusCode::FORBIDDEN if budget_exhausted || headers.contains_key(RETRY_AFTER) => {
            FetchError::RateLimited {
                retry_after: retry_after(headers, now),
            }
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound(status.to_string()),
        s if s.is_server_error() => FetchError::Unavailable(format!("upstream status {}", s)),
        s => FetchError::UpstreamRejected(format!("upstream status {}", s)),
    }
}

/// How long upstream asks us to wait: `retry-after`, then the reset epoch, then a default.
fn retry_after(headers: &HeaderMap, now: SystemTime) -> Duration {
    if let Some(secs) = header_u64(headers, RETRY_AFTER.as_str()) {
        return Duration::from_secs(secs);
    }
    if let Some(reset) = header_u64(headers, "x-ratelimit-reset") {
        let now_secs = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        return Duration::from_secs(reset.saturating_sub(now_secs).max(1));
    }
    DEFAULT_RETRY_AFTER
}

fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let limit = header_u64(headers, "x-ratelimit-limit");
    let remaining = header_u64(headers, "x-ratelimit-remaining");
    let reset_at = header_u64(headers, "x-ratelimit-reset")
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
    if limit.is_none() && remaining.is_none() && reset_at.is_none() {
        return None;
    }
    Some(RateLimitInfo {
        limit,
        remaining,
        reset_at,
    })
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
pub fn parse_next_link(value: &str) -> Option<String> {
    value.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')?
            .strip_suffix('>')
            .map(str::to_string)
    })
}
