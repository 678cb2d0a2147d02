//! Test helpers and utilities

use std::sync::Arc;
use std::time::Duration;

use healthgate::health::{HealthAggregator, Probe, ProbeRegistry, ServiceInfo};
use healthgate::lifecycle::{self, LifecycleState, Starting};
use healthgate::observability::Metrics;
use healthgate::server::{EndpointAdapter, HealthServer, ServerHandle};
use reqwest::{Client, Response, StatusCode};

/// Health listener running in this process
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub handle: Arc<ServerHandle>,
    pub lifecycle: LifecycleState,
}

#[allow(dead_code)]
impl TestServer {
    /// Start a listener on 127.0.0.1:0 serving the given probes.
    ///
    /// The lifecycle is left in Starting; call `serve()` on the token.
    pub async fn start(probes: Vec<Probe>) -> (Self, Starting) {
        Self::start_with_timeouts(probes, Duration::from_secs(3), Duration::from_secs(2)).await
    }

    pub async fn start_with_timeouts(
        probes: Vec<Probe>,
        health_timeout: Duration,
        ready_timeout: Duration,
    ) -> (Self, Starting) {
        let mut registry = ProbeRegistry::new();
        for probe in probes {
            registry.register(probe).expect("Failed to register probe");
        }

        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let (lifecycle, starting) = lifecycle::new();
        let aggregator = HealthAggregator::new(
            Arc::new(registry),
            ServiceInfo::new("itest", "test"),
        )
        .with_metrics(Arc::clone(&metrics));
        let adapter = EndpointAdapter::new(Arc::new(aggregator), lifecycle.clone())
            .with_timeouts(health_timeout, ready_timeout)
            .with_metrics(Arc::clone(&metrics));

        let server = HealthServer::bind("127.0.0.1:0".parse().unwrap(), Arc::new(adapter))
            .await
            .expect("Failed to bind health listener")
            .with_drain_timeout(Duration::from_secs(5))
            .with_metrics(metrics);
        let handle = Arc::new(server.spawn());

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let server = Self {
            base_url: format!("http://{}", handle.local_addr()),
            client,
            handle,
            lifecycle,
        };
        (server, starting)
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a HEAD request to the server
    pub async fn head(&self, path: &str) -> Response {
        self.client
            .head(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("HEAD request failed")
    }

    /// Make a POST request with an empty body
    pub async fn post(&self, path: &str) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("POST request failed")
    }

    /// GET and parse the JSON body
    pub async fn get_json(&self, path: &str) -> (StatusCode, serde_json::Value) {
        let resp = self.get(path).await;
        let status = resp.status();
        let body = resp.json().await.expect("Response is not JSON");
        (status, body)
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header
pub fn assert_header(response: &Response, name: &str, expected: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}
