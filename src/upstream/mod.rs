//! Upstream retrieval subsystem.
//!
//! # Data Flow
//! ```text
//! ResourceKey
//!     → client.rs fetch_all (pagination loop, page cap)
//!     → UpstreamClient::fetch_page (one HTTP request per page)
//!     → github.rs (URL building, Link parsing, status mapping)
//!     → Vec<Record> or FetchError
//! ```

pub mod client;
pub mod github;
pub mod types;

pub use client::{fetch_all, UpstreamClient};
pub use github::GitHubClient;
pub use types::{Page, PageCursor, RateLimitInfo, Record, Records, ResourceKey, ResourceKind};
