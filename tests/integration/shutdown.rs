//! Shutdown sequence tests
//!
//! Drives a full start-up and shutdown through the public API and checks
//! what an orchestrator would observe over HTTP in each phase.

use std::sync::Arc;
use std::time::Duration;

use healthgate::app;
use healthgate::error::BoxError;
use healthgate::config::{parse_dependencies, Config, LogFormat, LoggingConfig};
use healthgate::health::{CheckResult, Criticality, Probe};
use healthgate::{Phase, Resource, ShutdownCoordinator};
use reqwest::{Client, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::helpers::*;

/// TCP server that accepts and holds connections
async fn tcp_dependency() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr.to_string()
}

fn config(dependencies: &str, drain_grace: Duration) -> Config {
    let mut config = Config {
        server: Default::default(),
        dependencies: parse_dependencies(dependencies).unwrap(),
        logging: LoggingConfig {
            filter: "healthgate=info".into(),
            service_name: "itest".into(),
            format: LogFormat::Json,
        },
    };
    config.server.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.server.startup_timeout = Duration::from_secs(2);
    config.server.drain_grace = drain_grace;
    config.server.drain_timeout = Duration::from_secs(5);
    config
}

/// Readiness drops at the start of shutdown while liveness holds
#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let db = tcp_dependency().await;
    let config = config(
        &format!("db|critical|tcp://{},binance|informational|demo://", db),
        Duration::from_millis(800),
    );

    let running = app::start(&config).await.expect("start-up failed");
    let base = format!("http://{}", running.local_addr());
    let lifecycle = running.lifecycle().clone();
    let client = Client::new();

    let resp = client.get(format!("{}/ready", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["checks"]["binance"]["detail"]["mode"], "demo-mode");
    assert_eq!(body["checks"]["binance"]["detail"]["connector"], "binance");

    let shutdown = tokio::spawn(running.shutdown());

    // Inside the drain grace: listener still up, not ready, alive
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(lifecycle.current(), Phase::Draining);
    let resp = client.get(format!("{}/ready", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let resp = client.get(format!("{}/live", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let report = shutdown.await.unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(
        report.closed,
        vec!["db".to_string(), "http-listener".to_string()]
    );
    assert_eq!(lifecycle.current(), Phase::Stopped);

    // Listener is gone
    assert!(client.get(format!("{}/live", base)).send().await.is_err());
}

/// A critical dependency that is down keeps the service from serving
#[tokio::test]
async fn test_startup_fails_without_critical_dependency() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = config(&format!("db|critical|tcp://{}", addr), Duration::ZERO);

    let result = app::start(&config).await;
    assert!(matches!(
        result,
        Err(healthgate::StartupError::DependenciesUnavailable { .. })
    ));
}

/// In-flight requests finish when the listener closes
#[tokio::test]
async fn test_in_flight_request_completes_during_close() {
    let (server, starting) = TestServer::start(vec![Probe::from_fn(
        "slow",
        Criticality::Informational,
        || async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Ok(CheckResult::healthy())
        },
    )])
    .await;
    let serving = starting.serve();

    let url = format!("{}/health", server.base_url);
    let client = server.client.clone();
    let in_flight = tokio::spawn(async move { client.get(url).send().await });

    // Let the request reach the handler before closing
    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = ShutdownCoordinator::new(serving)
        .with_resource(Arc::clone(&server.handle) as Arc<dyn Resource>)
        .shutdown()
        .await;

    let resp = in_flight.await.unwrap().expect("in-flight request was dropped");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(report.is_clean());
    assert_eq!(server.lifecycle.current(), Phase::Stopped);
}

/// Takes a while to close and announces when it begins
struct SlowClose {
    closing: Arc<Notify>,
    delay: Duration,
}

#[async_trait::async_trait]
impl Resource for SlowClose {
    fn name(&self) -> &str {
        "bot-gateway"
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.closing.notify_one();
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Without any drain grace the listener still answers while dependencies close
#[tokio::test]
async fn test_listener_answers_while_dependencies_close() {
    let config = config("binance|informational|demo://", Duration::ZERO);
    let closing = Arc::new(Notify::new());

    let running = app::start(&config)
        .await
        .expect("start-up failed")
        .with_resource(Arc::new(SlowClose {
            closing: Arc::clone(&closing),
            delay: Duration::from_millis(500),
        }));
    let base = format!("http://{}", running.local_addr());
    let lifecycle = running.lifecycle().clone();
    let client = Client::new();

    let shutdown = tokio::spawn(running.shutdown());
    closing.notified().await;

    assert_eq!(lifecycle.current(), Phase::Draining);
    let resp = client.get(format!("{}/ready", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let resp = client.get(format!("{}/live", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let report = shutdown.await.unwrap();
    assert_eq!(
        report.closed,
        vec!["bot-gateway".to_string(), "http-listener".to_string()]
    );
    assert_eq!(lifecycle.current(), Phase::Stopped);
}
