//! Endpoint tests (/health, /ready, /live, /metrics)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use healthgate::health::{CheckResult, Criticality, HealthCheck, Probe};
use healthgate::ProbeError;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::helpers::*;

/// Check whose client panics
struct Exploding;

#[async_trait::async_trait]
impl HealthCheck for Exploding {
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        panic!("feed client bug")
    }
}

fn healthy(name: &str, criticality: Criticality) -> Probe {
    Probe::from_fn(name, criticality, || async { Ok(CheckResult::healthy()) })
}

fn unhealthy(name: &str, criticality: Criticality) -> Probe {
    Probe::from_fn(name, criticality, || async { Ok(CheckResult::unhealthy()) })
}

/// Informational failure is reported but leaves health and readiness green
#[tokio::test]
async fn test_informational_failure_reported_only() {
    let (server, starting) = TestServer::start(vec![
        healthy("db", Criticality::Critical),
        unhealthy("cache", Criticality::Informational),
    ])
    .await;
    let _serving = starting.serve();

    let resp = server.get("/health").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/json");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "itest");
    assert_eq!(body["checks"]["db"]["status"], "healthy");
    assert_eq!(body["checks"]["cache"]["status"], "unhealthy");
    assert_eq!(body["checks"]["cache"]["criticality"], "informational");
    assert!(body["uptime"].is_u64());

    let (status, body) = server.get_json("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "ready"}));
}

/// A hanging critical probe costs one deadline, then health is 503
#[tokio::test]
async fn test_hanging_critical_probe_bounded_by_deadline() {
    let (server, starting) = TestServer::start_with_timeouts(
        vec![Probe::from_fn("db", Criticality::Critical, || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(CheckResult::healthy())
        })],
        Duration::from_millis(300),
        Duration::from_millis(300),
    )
    .await;
    let _serving = starting.serve();

    let started = Instant::now();
    let (status, body) = server.get_json("/health").await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["error"], "Service unavailable");
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);

    let (status, _) = server.get_json("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

/// Failing probes never leak errors to the caller
#[tokio::test]
async fn test_probe_failures_are_data() {
    let (server, starting) = TestServer::start(vec![
        healthy("db", Criticality::Critical),
        Probe::from_fn("rpc", Criticality::Informational, || async {
            Err(ProbeError::failed("connection refused"))
        }),
        Probe::new("feed", Criticality::Informational, Exploding),
    ])
    .await;
    let _serving = starting.serve();

    let (status, body) = server.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["rpc"]["error"], "connection refused");
    assert_eq!(body["checks"]["feed"]["status"], "unhealthy");

    let keys: Vec<&String> = body["checks"].as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 3);
}

/// Before Serving the process is alive but not ready, and probes stay idle
#[tokio::test]
async fn test_starting_phase() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let (server, _starting) = TestServer::start(vec![Probe::from_fn(
        "db",
        Criticality::Critical,
        move || {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(CheckResult::healthy())
            }
        },
    )])
    .await;

    let (status, body) = server.get_json("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not ready");

    let (status, body) = server.get_json("/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Readiness is stable across repeated calls
#[tokio::test]
async fn test_ready_idempotent() {
    let (server, starting) = TestServer::start(vec![healthy("db", Criticality::Critical)]).await;
    let _serving = starting.serve();

    let first = server.get_json("/ready").await;
    let second = server.get_json("/ready").await;
    assert_eq!(first, second);
    assert_eq!(first.0, StatusCode::OK);
}

/// HEAD /health answers without running probes
#[tokio::test]
async fn test_head_health() {
    let (server, _starting) =
        TestServer::start(vec![unhealthy("db", Criticality::Critical)]).await;

    let resp = server.head("/health").await;
    assert_status(&resp, StatusCode::OK);
}

/// Unknown paths and wrong methods get JSON errors
#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let (server, _starting) = TestServer::start(vec![]).await;

    let (status, body) = server.get_json("/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
    assert_eq!(body["path"], "/nonexistent");

    let resp = server.post("/live").await;
    assert_status(&resp, StatusCode::METHOD_NOT_ALLOWED);
    assert_header(&resp, "allow", "GET");
}

/// /metrics exposes probe and lifecycle metrics in Prometheus format
#[tokio::test]
async fn test_metrics_endpoint() {
    let (server, starting) = TestServer::start(vec![healthy("db", Criticality::Critical)]).await;
    let _serving = starting.serve();

    server.get("/health").await;

    let resp = server.get("/metrics").await;
    assert_status(&resp, StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("healthgate_probe_checks_total"));
    assert!(body.contains("probe=\"db\",result=\"healthy\""));
    assert!(body.contains("healthgate_http_requests_total"));
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Clients that hang up mid-check take their checks down with them
#[tokio::test]
async fn test_client_disconnect_aborts_running_checks() {
    let started = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    let stuck = {
        let started = Arc::clone(&started);
        let dropped = Arc::clone(&dropped);
        Probe::from_fn("rpc", Criticality::Critical, move || {
            let started = Arc::clone(&started);
            let dropped = Arc::clone(&dropped);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                let _guard = DropCounter(dropped);
                std::future::pending::<()>().await;
                Ok(CheckResult::healthy())
            }
        })
    };

    // Far longer than any client would wait
    let (server, starting) = TestServer::start_with_timeouts(
        vec![stuck],
        Duration::from_secs(60),
        Duration::from_secs(2),
    )
    .await;
    let _serving = starting.serve();

    for _ in 0..3 {
        let mut stream = TcpStream::connect(server.handle.local_addr()).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(stream);
    }

    let deadline = Instant::now() + Duration::from_secs(3);
    while dropped.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(started.load(Ordering::SeqCst), 3);
    assert_eq!(dropped.load(Ordering::SeqCst), 3, "checks outlived their requests");
}
