//! Demo-mode connector.

use async_trait::async_trait;
use serde_json::json;

use crate::error::ProbeError;
use crate::health::{CheckResult, HealthCheck};

/// A connector with no live backend. Always healthy, flagged as demo.
#[derive(Debug, Clone)]
pub struct DemoConnector {
    label: String,
}

impl DemoConnector {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl HealthCheck for DemoConnector {
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        Ok(CheckResult::healthy().with_detail(json!({
            "mode": "demo-mode",
            "connector": self.label,
        })))
    }
}
