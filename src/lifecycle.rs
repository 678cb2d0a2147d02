//! Process lifecycle phase.
//!
//! The phase moves strictly forward: Starting → Serving → Draining → Stopped.
//! Readers see it through a cheap, cloneable [`LifecycleState`]; writers hold
//! a phase token ([`Starting`], [`Serving`], [`Draining`]) whose only
//! method consumes it and yields the next token. Since each token exists
//! once and is not `Clone`, a transition can neither be skipped, reversed
//! nor performed twice.
//!
//! ```rust,ignore
//! let (state, starting) = lifecycle::new();
//! let serving = starting.serve();
//! assert!(state.is_serving());
//! let stopped = serving.drain().stop();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Serving = 1,
    Draining = 2,
    Stopped = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Starting,
            1 => Phase::Serving,
            2 => Phase::Draining,
            _ => Phase::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Serving => "serving",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Shared {
    phase: AtomicU8,
    notify: watch::Sender<Phase>,
}

/// Read side of the lifecycle phase. Cloning is cheap; reads never block.
#[derive(Clone)]
pub struct LifecycleState {
    shared: Arc<Shared>,
}

/// Create the process lifecycle, returning the reader and the initial token.
pub fn new() -> (LifecycleState, Starting) {
    let (notify, _) = watch::channel(Phase::Starting);
    let state = LifecycleState {
        shared: Arc::new(Shared {
            phase: AtomicU8::new(Phase::Starting as u8),
            notify,
        }),
    };
    let token = Starting {
        state: state.clone(),
    };
    (state, token)
}

impl LifecycleState {
    /// Current phase.
    #[inline]
    pub fn current(&self) -> Phase {
        Phase::from_u8(self.shared.phase.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_serving(&self) -> bool {
        self.current() == Phase::Serving
    }

    /// Alive until Stopped.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.current() != Phase::Stopped
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.shared.notify.subscribe()
    }

    fn advance(&self, from: Phase, to: Phase) {
        // Tokens are unique, so the exchange only fails on a logic error
        let swapped = self.shared.phase.compare_exchange(
            from as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug_assert!(swapped.is_ok(), "lifecycle moved from {} unexpectedly", from);
        self.shared.notify.send_replace(to);
        info!(from = %from, to = %to, "Lifecycle transition");
    }
}

impl fmt::Debug for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleState")
            .field("phase", &self.current())
            .finish()
    }
}

/// Held by the start-up routine.
#[derive(Debug)]
#[must_use]
pub struct Starting {
    state: LifecycleState,
}

impl Starting {
    /// Start-up succeeded: begin serving traffic.
    pub fn serve(self) -> Serving {
        self.state.advance(Phase::Starting, Phase::Serving);
        Serving { state: self.state }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }
}

/// Held by whoever will run shutdown.
#[derive(Debug)]
#[must_use]
pub struct Serving {
    state: LifecycleState,
}

impl Serving {
    /// Termination requested: stop advertising readiness.
    pub fn drain(self) -> Draining {
        self.state.advance(Phase::Serving, Phase::Draining);
        Draining { state: self.state }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }
}

#[derive(Debug)]
#[must_use]
pub struct Draining {
    state: LifecycleState,
}

impl Draining {
    /// All resources attempted: the process is exiting.
    pub fn stop(self) -> Stopped {
        self.state.advance(Phase::Draining, Phase::Stopped);
        Stopped { _private: () }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }
}

/// Terminal phase marker.
#[derive(Debug)]
pub struct Stopped {
    _private: (),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let (state, starting) = new();
        assert_eq!(state.current(), Phase::Starting);
        assert!(state.is_alive());
        assert!(!state.is_serving());

        let serving = starting.serve();
        assert_eq!(state.current(), Phase::Serving);
        assert!(state.is_serving());

        let draining = serving.drain();
        assert_eq!(state.current(), Phase::Draining);
        assert!(!state.is_serving());
        assert!(state.is_alive());

        let _stopped = draining.stop();
        assert_eq!(state.current(), Phase::Stopped);
        assert!(!state.is_alive());
    }

    #[test]
    fn test_clones_share_phase() {
        let (state, starting) = new();
        let reader = state.clone();
        let _serving = starting.serve();
        assert_eq!(reader.current(), Phase::Serving);
    }

    #[tokio::test]
    async fn test_subscribe_sees_transitions() {
        let (state, starting) = new();
        let mut rx = state.subscribe();
        assert_eq!(*rx.borrow_and_update(), Phase::Starting);

        let serving = starting.serve();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Phase::Serving);

        let _draining = serving.drain();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Phase::Draining);
    }

    #[test]
    fn test_phase_order_and_display() {
        assert!(Phase::Starting < Phase::Serving);
        assert!(Phase::Draining < Phase::Stopped);
        assert_eq!(Phase::Draining.to_string(), "draining");
        assert_eq!(Phase::Stopped as u8, 3);
    }
}
