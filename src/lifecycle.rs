use std::fmt;

use tokio::sync::watch;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SessionState {
    Created,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    /// `Closed` is terminal. Every other state only moves forward by one step.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Created, SessionState::Open)
                | (SessionState::Open, SessionState::Closing)
                | (SessionState::Closing, SessionState::Closed)
        )
    }

    pub fn accepts_requests(self) -> bool {
        self == SessionState::Open
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a session. Transitions are atomic, and any number of
/// tasks can wait for a state to be reached.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<SessionState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(SessionState::Created),
        }
    }

    pub fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Move from `from` to `to`. Returns false, leaving the state untouched,
    /// when the session is not in `from` or the transition is not allowed.
    pub fn transition(&self, from: SessionState, to: SessionState) -> bool {
        if !from.can_transition_to(to) {
            return false;
        }
        self.state.send_if_modified(|state| {
            if *state != from {
                return false;
            }
            *state = to;
            true
        })
    }

    /// Resolve once the session has reached `target` or any later state.
    pub async fn reached(&self, target: SessionState) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| rank(*state) >= rank(target)).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn rank(state: SessionState) -> u8 {
    match state {
        SessionState::Created => 0,
        SessionState::Open => 1,
        SessionState::Closing => 2,
        SessionState::Closed => 3,
    }
}
