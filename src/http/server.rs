//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Construct the shared cache, deduplicator and upstream handle
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::cache::{CacheEntry, FreshnessCache};
use crate::config::{DefaultResourceConfig, ServiceConfig};
use crate::dedup::FetchDeduplicator;
use crate::http::handlers;
use crate::http::request::request_span;
use crate::upstream::{ResourceKey, UpstreamClient};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FreshnessCache>,
    pub dedup: Arc<FetchDeduplicator<ResourceKey, CacheEntry>>,
    pub client: Arc<dyn UpstreamClient>,
    pub default_resource: DefaultResourceConfig,
    pub max_pages: u32,
    pub stale_on_error: bool,
}

/// HTTP server for the issue proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server fronting `client`.
    pub fn new(config: ServiceConfig, client: Arc<dyn UpstreamClient>) -> Self {
        let state = AppState {
            cache: Arc::new(FreshnessCache::from_config(&config.cache)),
            dedup: Arc::new(FetchDeduplicator::new()),
            client,
            default_resource: config.default_resource.clone(),
            max_pages: config.upstream.max_pages,
            stale_on_error: config.cache.stale_on_error,
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(handlers::get_default_collection))
            .route("/repos/{owner}/{repo}", get(handlers::get_issues))
            .route("/repos/{owner}/{repo}/{kind}", get(handlers::get_collection))
            .route("/healthz", get(handlers::health))
            .route("/stats", get(handlers::get_stats))
            .fallback(handlers::unmatched)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            ttl_secs = self.config.cache.ttl_secs,
            capacity = self.config.cache.capacity,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for serving without a TCP listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared state handles (cache, deduplicator, client).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
