//! Process wiring: start-up, serving and shutdown.
//!
//! Start-up order:
//!
//! 1. build the probe registry from the declared dependencies
//! 2. bind the health listener while still Starting (`/live` is 200,
//!    `/ready` is 503)
//! 3. verify every critical dependency within the start-up timeout
//! 4. Starting → Serving
//!
//! Any failure before Serving exits with code 1. After the first
//! termination signal every dependency is closed in declaration order,
//! then the health listener (so `/live` answers until the end), and the
//! process exits with code 0.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::{Config, DependencySpec, DependencyTarget};
use crate::error::{RegistryError, StartupError};
use crate::health::{HealthAggregator, Probe, ProbeRegistry, ServiceInfo};
use crate::lifecycle::{self, LifecycleState, Serving};
use crate::observability::Metrics;
use crate::probes::{DemoConnector, JsonRpcProbe, TcpDependency};
use crate::server::{EndpointAdapter, HealthServer, ServerHandle};
use crate::shutdown::{Resource, ShutdownCoordinator, ShutdownReport};
use crate::signals::{ShutdownSignal, TerminationSignals};

/// Build probes for the declared dependencies.
///
/// Returns the registry plus the dependencies that own something to close,
/// both in declaration order.
pub fn build_dependencies(
    specs: &[DependencySpec],
) -> Result<(ProbeRegistry, Vec<Arc<dyn Resource>>), RegistryError> {
    let mut registry = ProbeRegistry::new();
    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();

    for spec in specs {
        let probe = match spec.target {
            DependencyTarget::Tcp { ref address } => {
                let dependency = Arc::new(TcpDependency::new(&spec.name, address));
                resources.push(Arc::clone(&dependency) as Arc<dyn Resource>);
                Probe::from_arc(&spec.name, spec.criticality, dependency)
            }
            DependencyTarget::JsonRpc {
                ref uri,
                ref method,
            } => Probe::new(
                &spec.name,
                spec.criticality,
                JsonRpcProbe::new(uri.clone(), method),
            ),
            DependencyTarget::Demo { ref label } => {
                Probe::new(&spec.name, spec.criticality, DemoConnector::new(label))
            }
        };

        let probe = match spec.timeout {
            Some(timeout) => probe.with_timeout(timeout),
            None => probe,
        };
        registry.register(probe)?;
    }

    Ok((registry, resources))
}

/// Check every critical dependency once before serving.
pub async fn verify_dependencies(
    aggregator: &HealthAggregator,
    timeout: Duration,
) -> Result<(), StartupError> {
    let report = aggregator.run_critical(timeout).await;

    let mut unavailable = Vec::new();
    for entry in &report.per_probe {
        if entry.outcome.status.is_healthy() {
            info!(dependency = %entry.name, "Dependency available");
            continue;
        }
        match entry.outcome.error {
            Some(ref e) => error!(dependency = %entry.name, error = %e, "Dependency unavailable"),
            None => error!(
                dependency = %entry.name,
                status = %entry.outcome.status,
                "Dependency unavailable"
            ),
        }
        unavailable.push(entry.name.clone());
    }

    if unavailable.is_empty() {
        Ok(())
    } else {
        Err(StartupError::DependenciesUnavailable {
            names: unavailable,
            timeout,
        })
    }
}

/// A service that reached Serving.
pub struct Running {
    serving: Serving,
    server: Arc<ServerHandle>,
    resources: Vec<Arc<dyn Resource>>,
    drain_grace: Duration,
}

impl Running {
    /// Address of the health listener.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn lifecycle(&self) -> &LifecycleState {
        self.serving.state()
    }

    /// Close `resource` on shutdown, after the declared dependencies.
    pub fn with_resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Drain and close everything: dependencies first, the listener last.
    pub async fn shutdown(self) -> ShutdownReport {
        ShutdownCoordinator::new(self.serving)
            .with_resources(self.resources)
            .with_resource(self.server)
            .with_drain_grace(self.drain_grace)
            .shutdown()
            .await
    }
}

/// Run start-up up to Serving.
pub async fn start(config: &Config) -> Result<Running, StartupError> {
    let metrics = Arc::new(Metrics::new()?);
    let (registry, resources) = build_dependencies(&config.dependencies)?;
    info!(
        probes = registry.len(),
        critical = registry.critical().count(),
        "Probe registry built"
    );

    let (lifecycle, starting) = lifecycle::new();
    spawn_phase_gauge(&lifecycle, Arc::clone(&metrics));

    let info = ServiceInfo::new(&config.server.service_name, &config.server.environment);
    let aggregator = Arc::new(
        HealthAggregator::new(Arc::new(registry), info).with_metrics(Arc::clone(&metrics)),
    );
    let adapter = EndpointAdapter::new(Arc::clone(&aggregator), lifecycle)
        .with_timeouts(config.server.health_timeout, config.server.ready_timeout)
        .with_metrics(Arc::clone(&metrics));

    let addr = config.server.listen_addr;
    let server = HealthServer::bind(addr, Arc::new(adapter))
        .await
        .map_err(|source| StartupError::Bind { addr, source })?
        .with_drain_timeout(config.server.drain_timeout)
        .with_access_log_enabled(config.server.access_log)
        .with_metrics(metrics);
    let server = Arc::new(server.spawn());

    if let Err(e) = verify_dependencies(&aggregator, config.server.startup_timeout).await {
        server.trigger_shutdown();
        return Err(e);
    }

    let serving = starting.serve();
    info!(
        "Serving health endpoints on http://{}/health",
        server.local_addr()
    );

    Ok(Running {
        serving,
        server,
        resources,
        drain_grace: config.server.drain_grace,
    })
}

fn spawn_phase_gauge(lifecycle: &LifecycleState, metrics: Arc<Metrics>) {
    let mut rx = lifecycle.subscribe();
    metrics.set_phase(lifecycle.current());
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let phase = *rx.borrow_and_update();
            metrics.set_phase(phase);
        }
    });
}

/// Run the service until a termination signal and return the exit code.
pub async fn run(config: Config) -> ExitCode {
    match TerminationSignals::install() {
        Ok(signals) => run_with_signals(config, signals).await,
        Err(e) => {
            error!(error = %StartupError::Signal(e), "Start-up failed");
            ExitCode::FAILURE
        }
    }
}

/// [`run`] with shutdown requested by `signals`.
pub async fn run_with_signals<S: ShutdownSignal>(config: Config, signals: S) -> ExitCode {
    ExitCode::from(exit_status(&serve_until_signal(config, signals).await))
}

/// 0 once shutdown ran, whatever failed to close; 1 if Serving was never reached.
fn exit_status(result: &Result<ShutdownReport, StartupError>) -> u8 {
    match result {
        Ok(report) => {
            for failure in &report.failures {
                warn!(error = %failure, "Resource was not closed cleanly");
            }
            0
        }
        Err(e) => {
            error!(error = %e, "Start-up failed");
            1
        }
    }
}

async fn serve_until_signal<S: ShutdownSignal>(
    config: Config,
    mut signals: S,
) -> Result<ShutdownReport, StartupError> {
    let running = tokio::select! {
        result = start(&config) => result?,
        signal = signals.recv() => {
            warn!(signal, "Termination signal received during start-up");
            return Err(StartupError::Interrupted);
        }
    };

    let signal = signals.recv().await;
    info!(signal, "Termination signal received, shutting down");

    let shutdown = running.shutdown();
    tokio::pin!(shutdown);
    let report = loop {
        tokio::select! {
            report = &mut shutdown => break report,
            signal = signals.recv() => {
                warn!(signal, "Shutdown already in progress, ignoring signal");
            }
        }
    };
    Ok(report)
}
