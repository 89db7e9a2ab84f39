//! Upstream capability and pagination.
//!
//! # Responsibilities
//! - Define the page-level capability every upstream implements
//! - Follow next-page cursors until exhausted or the page cap is reached
//! - Surface rate-limit budgets to logs and metrics
//!
//! # Design Decisions
//! - The client never sleeps or retries; callers own backoff
//! - Truncation at the page cap is not an error

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::observability::metrics;
use crate::upstream::types::{Page, PageCursor, Record, ResourceKey};

/// Page-level access to a remote paginated collection.
///
/// `cursor` is `None` for the first page and the previous page's `next`
/// afterwards.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch_page(&self, key: &ResourceKey, cursor: Option<&PageCursor>) -> FetchResult<Page>;
}

/// Fetch every record of a collection, reading at most `max_pages` pages.
pub async fn fetch_all(
    client: &dyn UpstreamClient,
    key: &ResourceKey,
    max_pages: u32,
) -> FetchResult<Vec<Record>> {
    let max_pages = max_pages.max(1);
    let mut records = Vec::new();
    let mut cursor: Option<PageCursor> = None;
    let mut pages = 0u32;

    loop {
        let page = match client.fetch_page(key, cursor.as_ref()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(key = %key, page = pages + 1, error = %e, "Upstream page fetch failed");
                metrics::record_upstream_fetch(e.kind());
                return Err(e);
            }
        };
        pages += 1;
        metrics::record_upstream_page();

        if let Some(rate_limit) = &page.rate_limit {
            tracing::debug!(
                key = %key,
                limit = ?rate_limit.limit,
                remaining = ?rate_limit.remaining,
                "Upstream rate limit budget"
            );
            if let Some(remaining) = rate_limit.remaining {
                metrics::record_rate_limit_remaining(remaining);
            }
        }

        records.extend(page.records);

        match page.next {
            Some(_) if pages >= max_pages => {
                tracing::warn!(
                    key = %key,
                    max_pages,
                    records = records.len(),
                    "Page limit reached, returning truncated collection"
                );
                break;
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::debug!(key = %key, pages, records = records.len(), "Upstream fetch complete");
    metrics::record_upstream_fetch("ok");
    Ok(records)
}
