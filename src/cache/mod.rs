//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! handler lookup
//!     → freshness.rs get (fresh within TTL → hit)
//!     → miss → dedup fetch → freshness.rs put (new version)
//!     → on refresh failure, optionally get_stale
//! ```
//!
//! # Design Decisions
//! - Entries are never expired proactively; age only turns a read into a miss
//! - Capacity is bounded by least-recently-used eviction
//! - Versions come from one counter so they never go backwards for a key

pub mod freshness;

pub use freshness::{CacheEntry, CacheStats, FreshnessCache};
