//! Health status, probe outcomes and the aggregated report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::Criticality;
use crate::error::ProbeError;
use crate::system::MemoryUsage;

/// Status of a single dependency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible aggregate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Unhealthy,
}

impl OverallStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, OverallStatus::Healthy)
    }
}

/// What a probe's check reports when it completes.
///
/// A negative result (e.g. a ping that returned the wrong value) is an
/// `Ok(CheckResult::unhealthy())`; a failed call is an `Err(ProbeError)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub status: HealthStatus,
    /// Opaque payload carried through to the report verbatim.
    pub detail: serde_json::Value,
}

impl CheckResult {
    pub fn healthy() -> Self {
        Self::with_status(HealthStatus::Healthy)
    }

    pub fn degraded() -> Self {
        Self::with_status(HealthStatus::Degraded)
    }

    pub fn unhealthy() -> Self {
        Self::with_status(HealthStatus::Unhealthy)
    }

    pub fn with_status(status: HealthStatus) -> Self {
        Self {
            status,
            detail: serde_json::Value::Null,
        }
    }

    /// Attach a detail payload.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Result of one probe invocation as recorded by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    /// Present iff the probe failed rather than returning a result.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_probe_error"
    )]
    pub error: Option<ProbeError>,
}

impl Outcome {
    /// Outcome of a check that returned a result.
    pub fn completed(result: CheckResult, latency: Duration) -> Self {
        Self {
            status: result.status,
            detail: result.detail,
            latency,
            error: None,
        }
    }

    /// Outcome of a check that failed, timed out or panicked.
    pub fn failed(error: ProbeError, latency: Duration) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            detail: serde_json::Value::Null,
            latency,
            error: Some(error),
        }
    }

    pub fn from_result(result: Result<CheckResult, ProbeError>, latency: Duration) -> Self {
        match result {
            Ok(result) => Self::completed(result, latency),
            Err(error) => Self::failed(error, latency),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().is_some_and(ProbeError::is_timeout)
    }
}

fn serialize_millis<S: Serializer>(latency: &Duration, s: S) -> Result<S::Ok, S::Error> {
    // Two decimals is enough for operators and keeps the JSON short
    let ms = (latency.as_secs_f64() * 100_000.0).round() / 100.0;
    s.serialize_f64(ms)
}

fn serialize_probe_error<S: Serializer>(
    error: &Option<ProbeError>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => s.collect_str(error),
        None => s.serialize_none(),
    }
}

/// One probe's entry in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeEntry {
    #[serde(skip)]
    pub name: String,
    pub criticality: Criticality,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Per-probe outcomes in registry order.
///
/// Serialized as a JSON object whose key order is the registry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResults(Vec<ProbeEntry>);

impl ProbeResults {
    pub fn new(entries: Vec<ProbeEntry>) -> Self {
        Self(entries)
    }

    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.0.iter().find(|e| e.name == name).map(|e| &e.outcome)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unhealthy iff any critical probe is not healthy.
    pub fn overall_status(&self) -> OverallStatus {
        let critical_failure = self
            .0
            .iter()
            .any(|e| e.criticality.is_critical() && !e.outcome.status.is_healthy());
        if critical_failure {
            OverallStatus::Unhealthy
        } else {
            OverallStatus::Healthy
        }
    }
}

impl Serialize for ProbeResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.name, entry)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a ProbeResults {
    type Item = &'a ProbeEntry;
    type IntoIter = std::slice::Iter<'a, ProbeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Aggregated point-in-time health of the service.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    #[serde(rename = "status")]
    pub overall_status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub version: String,
    pub environment: String,
    #[serde(rename = "checks")]
    pub per_probe: ProbeResults,
    #[serde(rename = "memory")]
    pub memory_usage: MemoryUsage,
    /// Process uptime in whole seconds.
    #[serde(rename = "uptime", serialize_with = "serialize_secs")]
    pub process_uptime: Duration,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.overall_status.is_healthy()
    }
}

fn serialize_secs<S: Serializer>(uptime: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(uptime.as_secs())
}
