//! Ordered, best-effort shutdown.
//!
//! [`ShutdownCoordinator::shutdown`] consumes the [`Serving`] token, so it
//! can run at most once per process. The sequence is:
//!
//! 1. Serving → Draining (readiness flips immediately)
//! 2. optional drain grace so orchestrators observe not-ready
//! 3. close every resource in declaration order, one at a time; a failed
//!    or panicking close is logged and the rest are still attempted
//! 4. Draining → Stopped
//!
//! ```rust,ignore
//! let report = ShutdownCoordinator::new(serving)
//!     .with_resource(db)
//!     .with_resource(server_handle)
//!     .shutdown()
//!     .await;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::{BoxError, ResourceCloseError};
use crate::lifecycle::Serving;

/// Something owned by the service that must be released on shutdown.
///
/// `close` is called at most once by the coordinator.
#[async_trait]
pub trait Resource: Send + Sync {
    fn name(&self) -> &str;

    async fn close(&self) -> Result<(), BoxError>;
}

/// Outcome of a completed shutdown.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Resources closed cleanly, in close order.
    pub closed: Vec<String>,
    /// Resources whose close failed, in close order.
    pub failures: Vec<ResourceCloseError>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives the process from Serving to Stopped.
pub struct ShutdownCoordinator {
    serving: Serving,
    resources: Vec<Arc<dyn Resource>>,
    drain_grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(serving: Serving) -> Self {
        Self {
            serving,
            resources: Vec::new(),
            drain_grace: Duration::ZERO,
        }
    }

    /// Append a resource. Resources close in the order they were added.
    pub fn with_resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_resources(
        mut self,
        resources: impl IntoIterator<Item = Arc<dyn Resource>>,
    ) -> Self {
        self.resources.extend(resources);
        self
    }

    /// Time to stay Draining before closing anything.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name())
    }

    /// Run the shutdown sequence. Never fails; close errors are reported.
    pub async fn shutdown(self) -> ShutdownReport {
        let started = Instant::now();
        let order: Vec<&str> = self.resource_names().collect();
        info!(resources = ?order, "Shutdown started");
        let draining = self.serving.drain();

        if !self.drain_grace.is_zero() {
            info!(grace = ?self.drain_grace, "Draining before closing resources");
            tokio::time::sleep(self.drain_grace).await;
        }

        let (closed, failures) = close_all(&self.resources).await;
        let _stopped = draining.stop();

        let report = ShutdownReport {
            closed,
            failures,
            elapsed: started.elapsed(),
        };
        info!(
            closed = report.closed.len(),
            failed = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Shutdown complete"
        );
        report
    }
}

async fn close_all(resources: &[Arc<dyn Resource>]) -> (Vec<String>, Vec<ResourceCloseError>) {
    let mut closed = Vec::with_capacity(resources.len());
    let mut failures = Vec::new();

    for resource in resources {
        let name = resource.name().to_string();
        let started = Instant::now();

        // Own task so a panicking close cannot abort the sequence
        let task = {
            let resource = Arc::clone(resource);
            tokio::spawn(async move { resource.close().await })
        };
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(BoxError::from(format!("close panicked: {}", e))),
        };

        match result {
            Ok(()) => {
                info!(
                    resource = %name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Resource closed"
                );
                closed.push(name);
            }
            Err(source) => {
                let err = ResourceCloseError {
                    resource: name,
                    source,
                };
                error!(error = %err, "Resource close failed, continuing");
                failures.push(err);
            }
        }
    }

    (closed, failures)
}
