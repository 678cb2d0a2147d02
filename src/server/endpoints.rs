//! Health, readiness and liveness endpoints.
//!
//! Translates the lifecycle phase and the aggregator's report into HTTP
//! responses:
//!
//! | Path       | Runs probes            | 200 when                         |
//! |------------|------------------------|----------------------------------|
//! | `/health`  | all                    | overall status healthy           |
//! | `/ready`   | critical, if Serving   | Serving and critical probes ok   |
//! | `/live`    | never                  | not Stopped                      |
//! | `/metrics` | never                  | always (Prometheus text)         |

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use http_body_util::Full;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use tracing::warn;

use crate::health::HealthAggregator;
use crate::lifecycle::LifecycleState;
use crate::observability::Metrics;

const JSON: &str = "application/json";
const PROMETHEUS: &str = "text/plain; version=0.0.4; charset=utf-8";

/// A fully formed endpoint reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Bytes,
    /// `Allow` header for 405 replies.
    pub allow: Option<&'static str>,
}

impl Reply {
    fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::json_bytes(status, body.to_string())
    }

    fn json_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: JSON,
            body: body.into(),
            allow: None,
        }
    }

    /// Body as JSON (tests and diagnostics).
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Some(allow) = self.allow {
            headers.insert(ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serves the health endpoints for one service.
pub struct EndpointAdapter {
    aggregator: Arc<HealthAggregator>,
    lifecycle: LifecycleState,
    health_timeout: Duration,
    ready_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl EndpointAdapter {
    pub fn new(aggregator: Arc<HealthAggregator>, lifecycle: LifecycleState) -> Self {
        Self {
            aggregator,
            lifecycle,
            health_timeout: Duration::from_secs(3),
            ready_timeout: Duration::from_secs(2),
            metrics: None,
        }
    }

    /// Batch deadlines for `/health` and `/ready`.
    pub fn with_timeouts(mut self, health: Duration, ready: Duration) -> Self {
        self.health_timeout = health;
        self.ready_timeout = ready;
        self
    }

    /// Serve `/metrics` and record request metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn lifecycle(&self) -> &LifecycleState {
        &self.lifecycle
    }

    fn service(&self) -> &str {
        &self.aggregator.info().service
    }

    /// Full report (200) or a short unavailable body (503).
    pub async fn health(&self) -> Reply {
        let report = self.aggregator.run_all(self.health_timeout).await;

        if report.is_healthy() {
            return match serde_json::to_vec(&report) {
                Ok(body) => Reply::json_bytes(StatusCode::OK, body),
                Err(e) => {
                    warn!(error = %e, "Failed to serialize health report");
                    self.unavailable()
                }
            };
        }

        let failing: Vec<&str> = report
            .per_probe
            .iter()
            .filter(|e| e.criticality.is_critical() && !e.outcome.status.is_healthy())
            .map(|e| e.name.as_str())
            .collect();
        warn!(failing = ?failing, "Health check failed");
        self.unavailable()
    }

    fn unavailable(&self) -> Reply {
        Reply::json(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({
                "status": "unhealthy",
                "timestamp": now_rfc3339(),
                "service": self.service(),
                "error": "Service unavailable",
            }),
        )
    }

    /// Ready only while Serving and every critical probe is healthy.
    pub async fn ready(&self) -> Reply {
        if !self.lifecycle.is_serving() {
            return not_ready();
        }

        let report = self.aggregator.run_critical(self.ready_timeout).await;
        if report.is_healthy() {
            Reply::json(StatusCode::OK, &json!({"status": "ready"}))
        } else {
            not_ready()
        }
    }

    /// Alive until Stopped. Never runs probes.
    pub fn live(&self) -> Reply {
        if self.lifecycle.is_alive() {
            Reply::json(StatusCode::OK, &json!({"status": "alive"}))
        } else {
            Reply::json(
                StatusCode::SERVICE_UNAVAILABLE,
                &json!({"status": "stopped"}),
            )
        }
    }

    pub fn metrics(&self) -> Reply {
        match self.metrics {
            Some(ref metrics) => Reply {
                status: StatusCode::OK,
                content_type: PROMETHEUS,
                body: Bytes::from(metrics.export()),
                allow: None,
            },
            None => self.not_found("/metrics"),
        }
    }

    fn not_found(&self, path: &str) -> Reply {
        Reply::json(
            StatusCode::NOT_FOUND,
            &json!({
                "error": "Not found",
                "path": path,
                "timestamp": now_rfc3339(),
            }),
        )
    }

    /// Route a request. The body is never read.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        let started = Instant::now();
        let (parts, _) = req.into_parts();
        let path = parts.uri.path();

        let (endpoint, reply) = match (&parts.method, path) {
            (&Method::GET, "/health") => ("/health", self.health().await),
            (&Method::HEAD, "/health") => ("/health", head_ok()),
            (&Method::GET, "/ready") => ("/ready", self.ready().await),
            (&Method::GET, "/live") => ("/live", self.live()),
            (&Method::GET, "/metrics") => ("/metrics", self.metrics()),
            (method, "/health" | "/ready" | "/live" | "/metrics") => {
                ("other", method_not_allowed(method, path))
            }
            _ => ("other", self.not_found(path)),
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record_http_request(
                endpoint,
                reply.status.as_u16(),
                started.elapsed().as_secs_f64(),
            );
        }
        reply.into_response()
    }
}

fn not_ready() -> Reply {
    Reply::json(
        StatusCode::SERVICE_UNAVAILABLE,
        &json!({"status": "not ready"}),
    )
}

fn head_ok() -> Reply {
    Reply::json_bytes(StatusCode::OK, Bytes::new())
}

fn method_not_allowed(method: &Method, path: &str) -> Reply {
    let mut reply = Reply::json(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({
            "error": "Method not allowed",
            "method": method.as_str(),
            "path": path,
        }),
    );
    reply.allow = Some(if path == "/health" { "GET, HEAD" } else { "GET" });
    reply
}
