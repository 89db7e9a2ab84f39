//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::upstream::ResourceKind;

/// Root configuration for the issue proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Freshness cache settings.
    pub cache: CacheConfig,

    /// Upstream API settings.
    pub upstream: UpstreamConfig,

    /// Collection served at `/` when the request names none.
    pub default_resource: DefaultResourceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Freshness cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds an entry is served without consulting upstream.
    pub ttl_secs: u64,

    /// Maximum number of cached collections (LRU beyond this).
    pub capacity: usize,

    /// Serve an expired entry when its refresh fails.
    pub stale_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            capacity: 1024,
            stale_on_error: false,
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API root (e.g., "https://api.github.com").
    pub base_url: String,

    /// Optional bearer token, passed through unchanged.
    pub token: Option<String>,

    /// User-Agent sent upstream (GitHub rejects requests without one).
    pub user_agent: String,

    /// Per-request deadline in seconds.
    pub timeout_secs: u64,

    /// Maximum pages read per fetch.
    pub max_pages: u32,

    /// Records requested per page (GitHub caps this at 100).
    pub per_page: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: None,
            user_agent: concat!("issue-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            max_pages: 10,
            per_page: 100,
        }
    }
}

/// The collection served when a request does not name one.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultResourceConfig {
    pub owner: String,
    pub repo: String,
    pub kind: ResourceKind,
}

impl Default for DefaultResourceConfig {
    fn default() -> Self {
        Self {
            owner: "chainguard-dev".to_string(),
            repo: "terraform-infra-common".to_string(),
            kind: ResourceKind::Issues,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.cache.ttl_secs, 30);
        assert!(!config.cache.stale_on_error);
        assert_eq!(config.upstream.timeout_secs, 10);
        assert_eq!(config.default_resource.repo, "terraform-infra-common");
        assert_eq!(config.default_resource.kind, ResourceKind::Issues);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [cache]
            ttl_secs = 5
            stale_on_error = true

            [default_resource]
            owner = "rust-lang"
            repo = "cargo"
            kind = "pulls"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.cache.capacity, 1024);
        assert!(config.cache.stale_on_error);
        assert_eq!(config.default_resource.kind, ResourceKind::Pulls);
        assert_eq!(config.upstream.base_url, "https://api.github.com");
    }
}
