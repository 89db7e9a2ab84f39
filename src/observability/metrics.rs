//! Metrics collection and exposition.
//!
//! # Metrics
//! - `issue_proxy_requests_total` (counter): inbound requests by status
//! - `issue_proxy_request_duration_seconds` (histogram): handler latency
//! - `issue_proxy_cache_events_total` (counter): hit, miss, expired, stale, eviction
//! - `issue_proxy_cache_entries` (gauge): cached collections
//! - `issue_proxy_upstream_fetches_total` (counter): fetch outcomes by error kind
//! - `issue_proxy_upstream_pages_total` (counter): pages read upstream
//! - `issue_proxy_upstream_rate_limit_remaining` (gauge): last reported budget
//! - `issue_proxy_dedup_waiters_total` (counter): requests that joined an in-flight fetch
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    counter!("issue_proxy_requests_total", "status" => status.to_string()).increment(1);
    histogram!("issue_proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_cache_event(event: &'static str) {
    counter!("issue_proxy_cache_events_total", "event" => event).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("issue_proxy_cache_entries").set(entries as f64);
}

pub fn record_upstream_fetch(outcome: &'static str) {
    counter!("issue_proxy_upstream_fetches_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_page() {
    counter!("issue_proxy_upstream_pages_total").increment(1);
}

pub fn record_rate_limit_remaining(remaining: u64) {
    gauge!("issue_proxy_upstream_rate_limit_remaining").set(remaining as f64);
}

pub fn record_dedup_waiter() {
    counter!("issue_proxy_dedup_waiters_total").increment(1);
}
