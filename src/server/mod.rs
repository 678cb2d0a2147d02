//! HTTP listener for the health endpoints.
//!
//! [`HealthServer`] binds the socket (so start-up failures surface before
//! anything else happens) and [`HealthServer::spawn`] runs the accept loop
//! in the background. The returned [`ServerHandle`] is a shutdown
//! [`Resource`]: closing it stops accepting, then lets in-flight requests
//! finish within the drain timeout.
//!
//! ```rust,ignore
//! let server = HealthServer::bind(addr, adapter).await?
//!     .with_drain_timeout(Duration::from_secs(30));
//! let handle = Arc::new(server.spawn());
//!
//! // later, from the shutdown coordinator
//! handle.close().await?;
//! ```

pub mod endpoints;

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use endpoints::{EndpointAdapter, Reply};

use crate::error::BoxError;
use crate::observability::Metrics;
use crate::shutdown::Resource;

/// Bound, not yet serving, health listener.
pub struct HealthServer {
    listener: TcpListener,
    adapter: Arc<EndpointAdapter>,
    drain_timeout: Duration,
    access_log_enabled: bool,
    metrics: Option<Arc<Metrics>>,
}

impl HealthServer {
    /// Bind the listener.
    pub async fn bind(addr: SocketAddr, adapter: Arc<EndpointAdapter>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            adapter,
            drain_timeout: Duration::from_secs(30),
            access_log_enabled: false,
            metrics: None,
        })
    }

    /// Max wait for in-flight requests once the listener is closed.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Emit one access log line per request (ACCESS_LOG=1).
    pub fn with_access_log_enabled(mut self, enabled: bool) -> Self {
        self.access_log_enabled = enabled;
        self
    }

    /// Track active connections in Prometheus metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start accepting connections in the background.
    pub fn spawn(self) -> ServerHandle {
        let addr = self
            .listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let active_connections = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(accept_loop(
            self,
            shutdown_rx,
            Arc::clone(&active_connections),
        ));

        info!(addr = %addr, "Health endpoints listening");

        ServerHandle {
            addr,
            shutdown_tx,
            shutdown_initiated: AtomicBool::new(false),
            active_connections,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Accept until told to stop, then drain. Returns whether every
/// connection finished within the drain timeout.
async fn accept_loop(
    server: HealthServer,
    mut shutdown_rx: watch::Receiver<bool>,
    active_connections: Arc<AtomicUsize>,
) -> bool {
    let HealthServer {
        listener,
        adapter,
        drain_timeout,
        access_log_enabled,
        metrics,
    } = server;
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, remote_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Accept error: {}", e);
                        continue;
                    }
                };
                let _ = stream.set_nodelay(true);

                let adapter = Arc::clone(&adapter);
                let service = service_fn(move |req| {
                    let adapter = Arc::clone(&adapter);
                    async move {
                        let started = Instant::now();
                        let method = req.method().clone();
                        let path = req.uri().path().to_string();

                        let response = adapter.handle(req).await;

                        if access_log_enabled {
                            info!(
                                target: "access",
                                method = %method,
                                path = %path,
                                status = response.status().as_u16() as u64,
                                duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                                ip = %remote_addr.ip(),
                            );
                        }
                        Ok::<_, Infallible>(response)
                    }
                });

                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let conn = graceful.watch(conn);

                let active = Arc::clone(&active_connections);
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    active.fetch_add(1, Ordering::SeqCst);
                    if let Some(ref m) = metrics {
                        m.inc_connections();
                    }

                    if let Err(e) = conn.await {
                        debug!("Connection error from {}: {}", remote_addr, e);
                    }

                    active.fetch_sub(1, Ordering::SeqCst);
                    if let Some(ref m) = metrics {
                        m.dec_connections();
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                debug!("Health listener received shutdown signal, stopping accept loop");
                break;
            }
        }
    }

    // Stop accepting before draining
    drop(listener);

    tokio::select! {
        _ = graceful.shutdown() => true,
        _ = tokio::time::sleep(drain_timeout) => {
            warn!(
                "Drain timeout reached with {} active connections",
                active_connections.load(Ordering::SeqCst)
            );
            false
        }
    }
}

/// Running health listener.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    shutdown_initiated: AtomicBool,
    active_connections: Arc<AtomicUsize>,
    task: Mutex<Option<JoinHandle<bool>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Trigger graceful shutdown.
    /// Stops the accept loop; in-flight requests keep running.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return; // Already initiated
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the accept loop to finish draining.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self) -> bool {
        let task = self.task.lock().await.take();
        match task {
            Some(task) => task.await.unwrap_or(false),
            None => true,
        }
    }
}

#[async_trait]
impl Resource for ServerHandle {
    fn name(&self) -> &str {
        "http-listener"
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.trigger_shutdown();
        if self.wait_for_drain().await {
            Ok(())
        } else {
            Err(format!(
                "drain timeout with {} connections still active",
                self.active_connections()
            )
            .into())
        }
    }
}
