//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use issue_proxy::config::ServiceConfig;
use issue_proxy::upstream::{Page, PageCursor, ResourceKey, UpstreamClient};
use issue_proxy::{FetchResult, HttpServer, Shutdown};

/// A running service under test.
pub struct TestService {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config suitable for tests: ephemeral port, metrics off.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.observability.metrics_enabled = false;
    config
}

/// Start the service on an ephemeral port in front of `client`.
pub async fn start_service(config: ServiceConfig, client: Arc<dyn UpstreamClient>) -> TestService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, client);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestService { addr, shutdown }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn issue(number: u64) -> Value {
    json!({
        "number": number,
        "title": format!("Issue #{}", number),
        "state": "open",
        "labels": [{ "name": "bug" }],
    })
}

/// Scripted upstream: a single page with a configurable outcome and delay.
pub struct FakeUpstream {
    outcome: Mutex<FetchResult<Vec<Value>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn new(outcome: FetchResult<Vec<Value>>) -> Arc<Self> {
        Self::with_delay(outcome, Duration::ZERO)
    }

    pub fn with_delay(outcome: FetchResult<Vec<Value>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_outcome(&self, outcome: FetchResult<Vec<Value>>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn fetch_page(&self, _key: &ResourceKey, _cursor: Option<&PageCursor>) -> FetchResult<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let records = self.outcome.lock().unwrap().clone()?;
        Ok(Page {
            records,
            next: None,
            rate_limit: None,
        })
    }
}

/// Canned behaviour for the mock GitHub API.
#[derive(Clone)]
pub enum MockReply {
    /// Serve these pages, linking each to the next.
    Pages(Vec<Vec<Value>>),
    /// Reply with a status and headers, empty JSON object body.
    Status(u16, Vec<(&'static str, &'static str)>),
    /// Sleep before serving a single empty page.
    Slow(Duration),
}

pub struct MockGitHub {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    pub authorization: Arc<Mutex<Vec<Option<String>>>>,
}

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    reply: MockReply,
    hits: Arc<AtomicUsize>,
    authorization: Arc<Mutex<Vec<Option<String>>>>,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
    state: Option<String>,
}

/// Start a GitHub-like API serving `/repos/{owner}/{repo}/{kind}`.
pub async fn start_mock_github(reply: MockReply) -> MockGitHub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let authorization = Arc::new(Mutex::new(Vec::new()));

    let state = MockState {
        addr,
        reply,
        hits: hits.clone(),
        authorization: authorization.clone(),
    };
    let app = Router::new()
        .route("/repos/{owner}/{repo}/{kind}", get(mock_collection))
        .with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockGitHub {
        addr,
        hits,
        authorization,
    }
}

async fn mock_collection(
    State(state): State<MockState>,
    Path((owner, repo, kind)): Path<(String, String, String)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.authorization.lock().unwrap().push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    assert_eq!(query.state.as_deref().unwrap_or("open"), "open");

    match state.reply {
        MockReply::Pages(pages) => {
            let page = query.page.unwrap_or(1).max(1);
            let records = pages.get(page - 1).cloned().unwrap_or_default();
            let mut response = Json(records).into_response();
            if page < pages.len() {
                let link = format!(
                    "<http://{}/repos/{}/{}/{}?state=open&page={}>; rel=\"next\", \
                     <http://{}/repos/{}/{}/{}?state=open&page={}>; rel=\"last\"",
                    state.addr, owner, repo, kind, page + 1,
                    state.addr, owner, repo, kind, pages.len(),
                );
                response
                    .headers_mut()
                    .insert("link", HeaderValue::from_str(&link).unwrap());
            }
            response
                .headers_mut()
                .insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
            response
        }
        MockReply::Status(status, extra) => {
            let mut response = (
                StatusCode::from_u16(status).unwrap(),
                Json(json!({ "message": "mock error" })),
            )
                .into_response();
            for (name, value) in extra {
                response
                    .headers_mut()
                    .insert(name, HeaderValue::from_static(value));
            }
            response
        }
        MockReply::Slow(delay) => {
            tokio::time::sleep(delay).await;
            Json(Vec::<Value>::new()).into_response()
        }
    }
}
