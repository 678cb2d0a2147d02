//! healthgate - dependency health aggregation and ordered shutdown.
//!
//! A service declares its external dependencies (database, cache, RPC
//! nodes, third-party connectors) as probes. healthgate runs them
//! concurrently under one deadline, tracks the process lifecycle phase and
//! answers the three orchestrator endpoints:
//!
//! - `/health`: full report, 503 when any critical dependency is down
//! - `/ready`: 200 only while Serving and every critical dependency is up
//! - `/live`: 200 until the process has stopped; never runs probes
//!
//! On SIGTERM the service stops advertising readiness, closes the listener
//! and then every dependency in declaration order, and exits.
//!
//! # Architecture
//!
//! ```text
//! signal ──► ShutdownCoordinator ──► LifecycleState ◄── EndpointAdapter ◄── HTTP
//!                    │                                        │
//!                    ▼                                        ▼
//!              Resource::close                        HealthAggregator
//!              (listener, deps)                               │
//!                                                   ┌─────────┼─────────┐
//!                                                   ▼         ▼         ▼
//!                                                 Probe     Probe     Probe
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use healthgate::health::{CheckResult, Criticality, HealthAggregator, Probe, ProbeRegistry, ServiceInfo};
//!
//! let mut registry = ProbeRegistry::new();
//! registry.register(Probe::from_fn("db", Criticality::Critical, || async {
//!     Ok(CheckResult::healthy())
//! }))?;
//!
//! let aggregator = HealthAggregator::new(Arc::new(registry), ServiceInfo::default());
//! let report = aggregator.run_all(Duration::from_secs(3)).await;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod app;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod observability;
pub mod probes;
pub mod server;
pub mod shutdown;
pub mod signals;
pub mod system;

// Re-exports for convenience
pub use config::Config;
pub use error::{ProbeError, RegistryError, StartupError};
pub use health::{HealthAggregator, HealthReport, Probe, ProbeRegistry};
pub use lifecycle::{LifecycleState, Phase};
pub use shutdown::{Resource, ShutdownCoordinator, ShutdownReport};
