//! Probe contract: a named, bounded check against one dependency.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::CheckResult;
use crate::error::ProbeError;

/// Whether a probe gates readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    /// Failure makes the service unhealthy and not ready.
    Critical,
    /// Failure is reported in health detail only.
    Informational,
}

impl Criticality {
    pub fn is_critical(&self) -> bool {
        matches!(self, Criticality::Critical)
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criticality::Critical => write!(f, "critical"),
            Criticality::Informational => write!(f, "informational"),
        }
    }
}

/// A dependency check.
///
/// Implementations must be idempotent and cheap enough to run on every
/// health request (ping, `SELECT 1`, latest block). The aggregator bounds
/// the call with a deadline and may abandon it, so a check must not rely
/// on running to completion.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<CheckResult, ProbeError>;
}

/// Adapter turning an async closure into a [`HealthCheck`].
struct FnCheck<F>(F);

#[async_trait]
impl<F, Fut> HealthCheck for FnCheck<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CheckResult, ProbeError>> + Send + 'static,
{
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        (self.0)().await
    }
}

/// A registered check: name, criticality tier and optional own timeout.
#[derive(Clone)]
pub struct Probe {
    name: String,
    criticality: Criticality,
    timeout: Option<Duration>,
    check: Arc<dyn HealthCheck>,
}

impl Probe {
    pub fn new(
        name: impl Into<String>,
        criticality: Criticality,
        check: impl HealthCheck + 'static,
    ) -> Self {
        Self::from_arc(name, criticality, Arc::new(check))
    }

    /// Share a check that is also used elsewhere (e.g. as a shutdown resource).
    pub fn from_arc(
        name: impl Into<String>,
        criticality: Criticality,
        check: Arc<dyn HealthCheck>,
    ) -> Self {
        Self {
            name: name.into(),
            criticality,
            timeout: None,
            check,
        }
    }

    /// Build a probe from an async closure.
    ///
    /// ```rust,ignore
    /// let probe = Probe::from_fn("cache", Criticality::Informational, || async {
    ///     Ok(CheckResult::healthy())
    /// });
    /// ```
    pub fn from_fn<F, Fut>(name: impl Into<String>, criticality: Criticality, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CheckResult, ProbeError>> + Send + 'static,
    {
        Self::new(name, criticality, FnCheck(f))
    }

    /// Set the probe's own timeout. A shorter batch deadline still wins.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    pub fn is_critical(&self) -> bool {
        self.criticality.is_critical()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn check_handle(&self) -> Arc<dyn HealthCheck> {
        Arc::clone(&self.check)
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("criticality", &self.criticality)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
