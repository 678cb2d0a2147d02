//! TCP reachability probe for databases, caches and other socket services.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{BoxError, ProbeError};
use crate::health::{CheckResult, HealthCheck};
use crate::shutdown::Resource;

/// A TCP dependency.
///
/// Each check opens a fresh connection and keeps the most recent one, so
/// the dependency owns at most one socket. Closing shuts that socket down
/// and makes every later check fail.
pub struct TcpDependency {
    name: String,
    address: String,
    conn: Mutex<Option<TcpStream>>,
    closed: AtomicBool,
}

impl TcpDependency {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            conn: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheck for TcpDependency {
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        if self.is_closed() {
            return Err(ProbeError::failed("connection closed"));
        }

        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| ProbeError::failed(format!("connect {}: {}", self.address, e)))?;
        let _ = stream.set_nodelay(true);

        let mut conn = self.conn.lock().await;
        // A close that raced this check wins
        if self.is_closed() {
            return Err(ProbeError::failed("connection closed"));
        }
        *conn = Some(stream);

        Ok(CheckResult::healthy().with_detail(json!({"address": self.address})))
    }
}

#[async_trait]
impl Resource for TcpDependency {
    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<(), BoxError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(format!("{} already closed", self.name).into());
        }

        let held = self.conn.lock().await.take();
        if let Some(mut stream) = held {
            stream.shutdown().await?;
            debug!(dependency = %self.name, "Connection shut down");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_then_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let db = TcpDependency::new("db", addr.to_string());
        let result = db.check().await.unwrap();
        assert!(result.status.is_healthy());
        assert_eq!(result.detail["address"], addr.to_string());

        db.close().await.unwrap();
        assert!(db.is_closed());
        assert_eq!(
            db.check().await.unwrap_err(),
            ProbeError::failed("connection closed")
        );

        // Close is allowed once
        assert!(db.close().await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_is_error() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let db = TcpDependency::new("db", addr.to_string());
        let err = db.check().await.unwrap_err();
        assert!(matches!(err, ProbeError::Failed(ref msg) if msg.starts_with("connect")));
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let cache = TcpDependency::new("cache", "127.0.0.1:1");
        assert!(cache.close().await.is_ok());
    }
}
