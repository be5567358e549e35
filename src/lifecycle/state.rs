//! Lifecycle states and their transition history.

use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::watch;
use tracing::info;

/// Process lifecycle, in the only order it can advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Starting,
    Running,
    /// Signal received; waiting for traffic to move away.
    Draining,
    /// Gateway, then RPC listener.
    StoppingPublic,
    /// Debug surface, then generic closers.
    StoppingDebug,
    Terminated,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::StoppingPublic => "stopping_public",
            LifecycleState::StoppingDebug => "stopping_debug",
            LifecycleState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus every transition with its timestamp.
pub struct StateMachine {
    tx: watch::Sender<LifecycleState>,
    history: Mutex<Vec<(LifecycleState, Instant)>>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self {
            tx,
            history: Mutex::new(vec![(LifecycleState::Starting, Instant::now())]),
        }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move forward to `next`. Returns false if that would go backwards.
    pub fn advance(&self, next: LifecycleState) -> bool {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current();
        if next <= current {
            return false;
        }

        history.push((next, Instant::now()));
        self.tx.send_replace(next);
        info!(from = %current, to = %next, "lifecycle state changed");
        true
    }

    /// Visited states in order.
    pub fn history(&self) -> Vec<(LifecycleState, Instant)> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advances_forward_only() {
        let states = StateMachine::new();
        assert_eq!(states.current(), LifecycleState::Starting);

        assert!(states.advance(LifecycleState::Running));
        assert!(states.advance(LifecycleState::Draining));
        assert!(!states.advance(LifecycleState::Running));
        assert!(!states.advance(LifecycleState::Draining));
        assert_eq!(states.current(), LifecycleState::Draining);

        let visited: Vec<_> = states.history().into_iter().map(|(s, _)| s).collect();
        assert_eq!(
            visited,
            vec![
                LifecycleState::Starting,
                LifecycleState::Running,
                LifecycleState::Draining
            ]
        );
    }

    #[test]
    fn test_history_timestamps_are_ordered() {
        let states = StateMachine::new();
        states.advance(LifecycleState::Running);
        states.advance(LifecycleState::Terminated);
        let history = states.history();
        assert!(history.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let states = StateMachine::new();
        let mut rx = states.subscribe();
        states.advance(LifecycleState::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Running);
        assert_eq!(LifecycleState::StoppingPublic.to_string(), "stopping_public");
    }
}
