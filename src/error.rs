//! Error types for probes, registration, shutdown and start-up.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error returned by dependency clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a probe produced no outcome of its own.
///
/// Never escapes the aggregator: it is recorded in the probe's entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The probe did not answer before its deadline.
    #[error("timeout")]
    Timeout,
    /// The probe's underlying call failed.
    #[error("{0}")]
    Failed(String),
    /// The probe task panicked.
    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl ProbeError {
    /// Wrap any displayable failure.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        ProbeError::Failed(err.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout)
    }
}

impl From<BoxError> for ProbeError {
    fn from(err: BoxError) -> Self {
        ProbeError::Failed(err.to_string())
    }
}

/// Registration-time programmer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate probe name: {0}")]
    DuplicateProbeName(String),
}

/// A resource failed to close during shutdown. Logged, never fatal.
#[derive(Debug, Error)]
#[error("failed to close {resource}: {source}")]
pub struct ResourceCloseError {
    pub resource: String,
    #[source]
    pub source: BoxError,
}

/// Failures that keep the process from ever reaching Serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("probe registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("critical dependencies unavailable after {timeout:?}: {}", .names.join(", "))]
    DependenciesUnavailable { names: Vec<String>, timeout: Duration },

    #[error("termination signal received during start-up")]
    Interrupted,

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}
