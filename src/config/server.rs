//! Listener and lifecycle timing configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_or, env_parse};
use super::ConfigError;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address for /health, /ready, /live (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Service name reported in health responses.
    pub service_name: String,
    /// Deployment environment reported in health responses.
    pub environment: String,
    /// Batch deadline for /health.
    pub health_timeout: Duration,
    /// Batch deadline for /ready.
    pub ready_timeout: Duration,
    /// Deadline for verifying critical dependencies before serving.
    pub startup_timeout: Duration,
    /// Time spent draining (not ready) before resources are closed.
    pub drain_grace: Duration,
    /// Graceful shutdown drain timeout for in-flight requests.
    pub drain_timeout: Duration,
    /// Access logging enabled (ACCESS_LOG=1).
    pub access_log: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr: SocketAddr =
            env_parse("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let health_timeout = env_duration("HEALTH_TIMEOUT", "3s")?;
        let ready_timeout = env_duration("READY_TIMEOUT", "2s")?;
        let startup_timeout = env_duration("STARTUP_TIMEOUT", "10s")?;

        for (key, value) in [
            ("HEALTH_TIMEOUT", health_timeout),
            ("READY_TIMEOUT", ready_timeout),
            ("STARTUP_TIMEOUT", startup_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    key: key.into(),
                    message: "deadline must be greater than zero".into(),
                });
            }
        }

        Ok(Self {
            listen_addr,
            service_name: env_or("SERVICE_NAME", "healthgate"),
            environment: env_or("APP_ENV", "development"),
            health_timeout,
            ready_timeout,
            startup_timeout,
            drain_grace: env_duration("DRAIN_GRACE", "0")?,
            drain_timeout: env_duration("DRAIN_TIMEOUT", "30s")?,
            access_log: env_bool("ACCESS_LOG", false),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            service_name: "healthgate".to_string(),
            environment: "development".to_string(),
            health_timeout: Duration::from_secs(3),
            ready_timeout: Duration::from_secs(2),
            startup_timeout: Duration::from_secs(10),
            drain_grace: Duration::ZERO,
            drain_timeout: Duration::from_secs(30),
            access_log: false,
        }
    }
}
