//! Dependency declarations (`DEPENDENCIES`).
//!
//! Each entry is `name|tier|target[|timeout]`, entries separated by commas:
//!
//! ```text
//! DEPENDENCIES="postgres|critical|tcp://db:5432|2s,redis|critical|tcp://cache:6379,
//!               ethereum|informational|jsonrpc+http://eth:8545/?method=eth_blockNumber,
//!               binance|informational|demo://binance"
//! ```
//!
//! Declaration order is both the report order and the shutdown close order.

use std::time::Duration;

use http::Uri;

use super::parse::{env_opt, parse_duration};
use super::ConfigError;
use crate::health::Criticality;

const KEY: &str = "DEPENDENCIES";

/// Where and how a dependency is checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyTarget {
    /// TCP reachability of `host:port`.
    Tcp { address: String },
    /// JSON-RPC "latest block" call over plain HTTP.
    JsonRpc { uri: Uri, method: String },
    /// Connector running in demo mode; nothing to reach.
    Demo { label: String },
}

/// One declared dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencySpec {
    pub name: String,
    pub criticality: Criticality,
    pub target: DependencyTarget,
    /// The probe's own timeout. The batch deadline still wins when shorter.
    pub timeout: Option<Duration>,
}

/// Load dependency declarations from `DEPENDENCIES`.
pub fn dependencies_from_env() -> Result<Vec<DependencySpec>, ConfigError> {
    match env_opt(KEY) {
        Some(value) => parse_dependencies(&value),
        None => Ok(Vec::new()),
    }
}

/// Parse a full `DEPENDENCIES` value.
///
/// Name uniqueness is not checked here; the probe registry rejects duplicates.
pub fn parse_dependencies(value: &str) -> Result<Vec<DependencySpec>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Result<DependencySpec, ConfigError> {
    let fields: Vec<&str> = entry.split('|').map(str::trim).collect();
    if fields.len() < 3 || fields.len() > 4 {
        return Err(invalid(format!(
            "expected name|tier|target[|timeout], got '{}'",
            entry
        )));
    }

    let name = fields[0];
    if name.is_empty() {
        return Err(invalid(format!("empty dependency name in '{}'", entry)));
    }

    let criticality = match fields[1].to_lowercase().as_str() {
        "critical" => Criticality::Critical,
        "informational" | "info" => Criticality::Informational,
        other => return Err(invalid(format!("unknown tier '{}' for {}", other, name))),
    };

    let target = parse_target(name, fields[2])?;

    let timeout = match fields.get(3) {
        Some(raw) => {
            let timeout = parse_duration(raw).map_err(|e| ConfigError::Parse {
                key: KEY.into(),
                value: (*raw).to_string(),
                error: e,
            })?;
            if timeout.is_zero() {
                return Err(invalid(format!("zero timeout for {}", name)));
            }
            Some(timeout)
        }
        None => None,
    };

    Ok(DependencySpec {
        name: name.to_string(),
        criticality,
        target,
        timeout,
    })
}

fn parse_target(name: &str, raw: &str) -> Result<DependencyTarget, ConfigError> {
    if let Some(address) = raw.strip_prefix("tcp://") {
        if address.rsplit_once(':').map_or(true, |(host, port)| {
            host.is_empty() || port.parse::<u16>().is_err()
        }) {
            return Err(invalid(format!(
                "{}: tcp target must be host:port, got '{}'",
                name, address
            )));
        }
        return Ok(DependencyTarget::Tcp {
            address: address.to_string(),
        });
    }

    if let Some(url) = raw.strip_prefix("jsonrpc+") {
        let parsed: Uri = url.parse().map_err(|e: http::uri::InvalidUri| ConfigError::Parse {
            key: KEY.into(),
            value: url.to_string(),
            error: e.to_string(),
        })?;
        if parsed.scheme_str() != Some("http") {
            return Err(invalid(format!(
                "{}: only jsonrpc+http:// targets are supported",
                name
            )));
        }
        let authority = parsed
            .authority()
            .ok_or_else(|| invalid(format!("{}: rpc target has no host", name)))?;

        let method = parsed
            .query()
            .and_then(|q| {
                q.split('&')
                    .find_map(|pair| pair.strip_prefix("method="))
                    .map(str::to_string)
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "eth_blockNumber".to_string());

        let uri: Uri = format!("http://{}{}", authority, parsed.path())
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(format!("{}: {}", name, e)))?;

        return Ok(DependencyTarget::JsonRpc { uri, method });
    }

    if let Some(label) = raw.strip_prefix("demo://") {
        let label = if label.is_empty() { name } else { label };
        return Ok(DependencyTarget::Demo {
            label: label.to_string(),
        });
    }

    Err(invalid(format!("{}: unsupported target '{}'", name, raw)))
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid {
        key: KEY.into(),
        message,
    }
}
