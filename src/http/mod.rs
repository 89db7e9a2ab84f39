//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID span, ResourceKey parsing)
//!     → handlers.rs (cache → dedup → upstream)
//!     → response.rs (headers, error → status mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{CacheStatus, X_CACHE};
pub use server::{AppState, HttpServer};
