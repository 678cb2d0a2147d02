//! Dependency health: probes, the registry and the aggregator.
//!
//! A service declares its dependencies as [`Probe`]s in a [`ProbeRegistry`].
//! The [`HealthAggregator`] runs them concurrently under one deadline and
//! folds the outcomes into a [`HealthReport`]:
//!
//! - **Critical** probes gate readiness; any non-healthy critical probe
//!   makes the whole report unhealthy.
//! - **Informational** probes are reported but never change the overall
//!   status.
//!
//! ```rust,ignore
//! let mut registry = ProbeRegistry::new();
//! registry.register(Probe::from_fn("db", Criticality::Critical, || async {
//!     Ok(CheckResult::healthy())
//! }))?;
//!
//! let aggregator = HealthAggregator::new(Arc::new(registry), ServiceInfo::default());
//! let report = aggregator.run_all(Duration::from_secs(3)).await;
//! ```

mod aggregator;
mod probe;
mod registry;
mod status;

pub use aggregator::{HealthAggregator, ProbeScope, ServiceInfo};
pub use probe::{Criticality, HealthCheck, Probe};
pub use registry::ProbeRegistry;
pub use status::{
    CheckResult, HealthReport, HealthStatus, Outcome, OverallStatus, ProbeEntry, ProbeResults,
};
