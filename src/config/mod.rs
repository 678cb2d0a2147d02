//! Configuration module for healthgate.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use healthgate::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Dependencies: {}", config.dependencies.len());
//! ```

mod dependencies;
mod error;
mod logging;
mod parse;
mod server;

pub use dependencies::{parse_dependencies, DependencySpec, DependencyTarget};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{parse_duration, MAX_DURATION};
pub use server::ServerConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Listener and lifecycle timing configuration.
    pub server: ServerConfig,
    /// Declared dependencies, in registry order.
    pub dependencies: Vec<DependencySpec>,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            dependencies: dependencies::dependencies_from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Service: {} ({})", self.server.service_name, self.server.environment);
        info!("  Listen: {}", self.server.listen_addr);
        info!(
            "  Deadlines: health={:?} ready={:?} startup={:?}",
            self.server.health_timeout, self.server.ready_timeout, self.server.startup_timeout
        );
        info!(
            "  Drain: grace={:?} timeout={:?}",
            self.server.drain_grace, self.server.drain_timeout
        );

        if self.dependencies.is_empty() {
            info!("  Dependencies: none");
        }
        for dep in &self.dependencies {
            info!("  Dependency: {} ({}) -> {:?}", dep.name, dep.criticality, dep.target);
        }

        if self.server.access_log {
            info!("  Access log: enabled");
        }
    }
}
