//! Termination signal handling.

use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Source of shutdown requests.
///
/// `recv` resolves once per request with a short name for logging.
#[async_trait]
pub trait ShutdownSignal: Send {
    async fn recv(&mut self) -> &'static str;
}

/// SIGTERM and SIGINT (Ctrl-C elsewhere), installed once at start-up.
pub struct TerminationSignals {
    #[cfg(unix)]
    term: tokio::signal::unix::Signal,
    #[cfg(unix)]
    int: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                term: signal(SignalKind::terminate())?,
                int: signal(SignalKind::interrupt())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }
}

#[async_trait]
impl ShutdownSignal for TerminationSignals {
    async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.term.recv() => "SIGTERM",
                _ = self.int.recv() => "SIGINT",
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            "ctrl-c"
        }
    }
}

/// Shutdown requested over a channel, for embedding and tests.
/// A closed channel never fires.
#[async_trait]
impl ShutdownSignal for mpsc::Receiver<&'static str> {
    async fn recv(&mut self) -> &'static str {
        match mpsc::Receiver::recv(self).await {
            Some(name) => name,
            None => std::future::pending().await,
        }
    }
}
