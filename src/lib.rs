//! Cached, deduplicating proxy for GitHub repository collections.

pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod upstream;

pub use config::ServiceConfig;
pub use error::{FetchError, FetchResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
