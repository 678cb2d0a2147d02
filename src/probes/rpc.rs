//! JSON-RPC "latest block" probe for blockchain nodes.
//!
//! Sends a parameterless call such as `eth_blockNumber` or `getSlot` and
//! reports healthy iff the node answers with a block number above zero.

use async_trait::async_trait;
use bytes::Bytes;
use http::Uri;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::{json, Value};

use crate::error::ProbeError;
use crate::health::{CheckResult, HealthCheck};

/// JSON-RPC node probe over plain HTTP.
pub struct JsonRpcProbe {
    uri: Uri,
    method: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl JsonRpcProbe {
    pub fn new(uri: Uri, method: impl Into<String>) -> Self {
        Self {
            uri,
            method: method.into(),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    fn request_body(&self) -> Bytes {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": self.method,
            "params": [],
        });
        Bytes::from(body.to_string())
    }
}

#[async_trait]
impl HealthCheck for JsonRpcProbe {
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        let req = Request::post(self.uri.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(self.request_body()))
            .map_err(ProbeError::failed)?;

        let resp = self.client.request(req).await.map_err(ProbeError::failed)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::failed(format!("HTTP {}", status)));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(ProbeError::failed)?
            .to_bytes();
        let reply: Value = serde_json::from_slice(&body).map_err(ProbeError::failed)?;

        if let Some(error) = reply.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ProbeError::Failed(message));
        }

        let latest = reply
            .get("result")
            .and_then(parse_block_number)
            .ok_or_else(|| ProbeError::failed(format!("unexpected {} result", self.method)))?;

        let result = if latest > 0 {
            CheckResult::healthy()
        } else {
            CheckResult::unhealthy()
        };
        Ok(result.with_detail(json!({ "latest": latest })))
    }
}

/// A block number as a JSON number or a `0x` hex string.
fn parse_block_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}
