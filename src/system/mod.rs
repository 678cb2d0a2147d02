//! Point-in-time process metadata included in health reports.
//!
//! Memory figures are cgroup-aware so that `total` reflects the container
//! limit in Kubernetes rather than the host.

mod memory;

use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub use memory::MemoryUsage;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Record the process start time. Only the first call counts.
pub fn mark_process_start() {
    PROCESS_START.get_or_init(Instant::now);
}

/// Time since [`mark_process_start`] (or since the first call to this
/// function when it was never marked).
pub fn process_uptime() -> Duration {
    PROCESS_START.get_or_init(Instant::now).elapsed()
}
