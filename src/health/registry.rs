//! Probe registry: the service's declared dependency set.
//!
//! Probes are registered during start-up and never removed. Once the
//! registry is handed to the aggregator (behind an `Arc`) it can no longer
//! be mutated, so concurrent reads need no synchronization.

use tracing::debug;

use super::{Criticality, Probe};
use crate::error::RegistryError;

/// Ordered set of uniquely named probes.
#[derive(Debug, Clone, Default)]
pub struct ProbeRegistry {
    probes: Vec<Probe>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe. Fails if the name is already taken.
    pub fn register(&mut self, probe: Probe) -> Result<(), RegistryError> {
        if self.get(probe.name()).is_some() {
            return Err(RegistryError::DuplicateProbeName(probe.name().to_string()));
        }
        debug!(
            probe = probe.name(),
            criticality = %probe.criticality(),
            "Registered probe"
        );
        self.probes.push(probe);
        Ok(())
    }

    /// Registered probes in registration order.
    pub fn list(&self) -> &[Probe] {
        &self.probes
    }

    /// Critical probes in registration order.
    pub fn critical(&self) -> impl Iterator<Item = &Probe> {
        self.probes.iter().filter(|p| p.is_critical())
    }

    pub fn get(&self, name: &str) -> Option<&Probe> {
        self.probes.iter().find(|p| p.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(Probe::name)
    }

    pub fn count(&self, criticality: Criticality) -> usize {
        self.probes
            .iter()
            .filter(|p| p.criticality() == criticality)
            .count()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}
