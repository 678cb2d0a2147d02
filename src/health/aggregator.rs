//! Concurrent probe execution under a single batch deadline.
//!
//! Every probe runs in its own task. The aggregator waits for each task
//! until the batch deadline (or the probe's own shorter timeout), records
//! a timeout for anything still outstanding and aborts it. Dropping a run
//! before it completes aborts its tasks as well. One probe's failure or
//! panic never affects the others or the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::task::{AbortHandle, JoinError};
use tokio::time::Instant;
use tracing::debug;

use super::{HealthReport, Outcome, Probe, ProbeEntry, ProbeRegistry, ProbeResults};
use crate::error::ProbeError;
use crate::observability::Metrics;
use crate::system::{self, MemoryUsage};

/// Identity fields copied into every report.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub environment: String,
}

impl ServiceInfo {
    pub fn new(service: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: crate::PKG_VERSION.to_string(),
            environment: environment.into(),
        }
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self::new("healthgate", "development")
    }
}

/// Which registered probes a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScope {
    /// Every registered probe (health).
    All,
    /// Critical probes only (readiness).
    CriticalOnly,
}

/// Runs registered probes and folds their outcomes into a [`HealthReport`].
///
/// Stateless; safe to share and call concurrently.
pub struct HealthAggregator {
    registry: Arc<ProbeRegistry>,
    info: ServiceInfo,
    metrics: Option<Arc<Metrics>>,
}

impl HealthAggregator {
    pub fn new(registry: Arc<ProbeRegistry>, info: ServiceInfo) -> Self {
        Self {
            registry,
            info,
            metrics: None,
        }
    }

    /// Record every probe outcome in Prometheus metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// Run every registered probe under `deadline`.
    pub async fn run_all(&self, deadline: Duration) -> HealthReport {
        self.run(deadline, ProbeScope::All).await
    }

    /// Run only critical probes under `deadline`.
    pub async fn run_critical(&self, deadline: Duration) -> HealthReport {
        self.run(deadline, ProbeScope::CriticalOnly).await
    }

    /// Run the probes in `scope`. Never waits past `deadline` and never fails.
    pub async fn run(&self, deadline: Duration, scope: ProbeScope) -> HealthReport {
        let batch_deadline = deadline_after(Instant::now(), deadline);

        let probes = self
            .registry
            .list()
            .iter()
            .filter(|p| scope == ProbeScope::All || p.is_critical());

        let entries = join_all(probes.map(|probe| run_probe(probe, batch_deadline))).await;

        if let Some(ref metrics) = self.metrics {
            for entry in &entries {
                metrics.record_probe(&entry.name, &entry.outcome);
            }
        }

        let per_probe = ProbeResults::new(entries);
        HealthReport {
            overall_status: per_probe.overall_status(),
            timestamp: Utc::now(),
            service: self.info.service.clone(),
            version: self.info.version.clone(),
            environment: self.info.environment.clone(),
            per_probe,
            memory_usage: MemoryUsage::read(),
            process_uptime: system::process_uptime(),
        }
    }
}

/// Used when a configured duration does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(start: Instant, duration: Duration) -> Instant {
    start
        .checked_add(duration)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Aborts the probe task when the run finishes or is dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one probe in its own task, bounded by the batch deadline.
async fn run_probe(probe: &Probe, batch_deadline: Instant) -> ProbeEntry {
    let started = Instant::now();
    let deadline = match probe.timeout() {
        Some(timeout) => batch_deadline.min(deadline_after(started, timeout)),
        None => batch_deadline,
    };

    let check = probe.check_handle();
    let task = tokio::spawn(async move {
        let started = Instant::now();
        let result = check.check().await;
        (result, started.elapsed())
    });
    let _abort = AbortOnDrop(task.abort_handle());

    // A timed-out task is aborted when `_abort` drops
    let outcome = match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok((result, latency))) => Outcome::from_result(result, latency),
        Ok(Err(err)) => {
            Outcome::failed(ProbeError::Panicked(panic_message(err)), started.elapsed())
        }
        Err(_) => Outcome::failed(ProbeError::Timeout, started.elapsed()),
    };

    if let Some(ref error) = outcome.error {
        debug!(probe = probe.name(), error = %error, "Probe failed");
    }

    ProbeEntry {
        name: probe.name().to_string(),
        criticality: probe.criticality(),
        outcome,
    }
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(msg) = payload.downcast_ref::<&str>() {
                (*msg).to_string()
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}
