//! Process memory usage for health reports.
//!
//! Read fresh on every call from `/proc` and the cgroup hierarchy.
//! Values are zero on platforms without `/proc`.

use std::fs;

use serde::Serialize;
use tracing::trace;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// cgroup v1 reports "unlimited" as a very large value (~9 exabytes).
const CGROUP_V1_UNLIMITED: u64 = 9_000_000_000_000_000_000;

/// Memory figures in whole megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    /// Resident set size of this process.
    pub used: u64,
    /// Memory available to this process: cgroup limit, else host total.
    pub total: u64,
    pub unit: &'static str,
}

impl MemoryUsage {
    /// Read current memory usage.
    pub fn read() -> Self {
        let used = fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|content| parse_status_kb(&content, "VmRSS:"))
            .map(|kb| kb * 1024)
            .unwrap_or(0);

        let total = cgroup_memory_limit()
            .or_else(|| {
                fs::read_to_string("/proc/meminfo")
                    .ok()
                    .and_then(|content| parse_status_kb(&content, "MemTotal:"))
                    .map(|kb| kb * 1024)
            })
            .unwrap_or(0);

        Self::from_bytes(used, total)
    }

    /// Build from byte counts, rounding to the nearest megabyte.
    pub fn from_bytes(used: u64, total: u64) -> Self {
        Self {
            used: to_mb(used),
            total: to_mb(total),
            unit: "MB",
        }
    }
}

fn to_mb(bytes: u64) -> u64 {
    (bytes + BYTES_PER_MB / 2) / BYTES_PER_MB
}

/// Find a line like "VmRSS:     12345 kB" and return the value in kB.
fn parse_status_kb(content: &str, key: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with(key))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
}

/// Memory limit from cgroup v2 `memory.max`, then cgroup v1.
fn cgroup_memory_limit() -> Option<u64> {
    if let Ok(content) = fs::read_to_string("/sys/fs/cgroup/memory.max") {
        let trimmed = content.trim();
        if trimmed != "max" {
            if let Ok(value) = trimmed.parse::<u64>() {
                trace!("cgroup v2 memory.max: {} bytes", value);
                return Some(value);
            }
        }
        return None;
    }

    if let Ok(content) = fs::read_to_string("/sys/fs/cgroup/memory/memory.limit_in_bytes") {
        if let Ok(value) = content.trim().parse::<u64>() {
            if value < CGROUP_V1_UNLIMITED {
                trace!("cgroup v1 memory.limit_in_bytes: {} bytes", value);
                return Some(value);
            }
        }
    }

    None
}
