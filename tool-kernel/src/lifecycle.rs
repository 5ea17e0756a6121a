//! Lifecycle state machine for one serving session.

use thiserror::Error;
use tool_primitives::SessionId;
use tracing::debug;

/// States a server session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, not yet reading frames.
    Init,
    /// Reading frames and dispatching requests.
    Serving,
    /// Input closed; waiting for in-flight requests.
    Draining,
    /// Finished; no further frames are read or answered.
    Stopped,
}

impl ServerState {
    /// Returns `true` while frames are being accepted.
    #[must_use]
    pub const fn is_serving(self) -> bool {
        matches!(self, Self::Serving)
    }

    /// Returns `true` once the session has stopped.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Events that trigger lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Begin reading frames.
    Start,
    /// Input closed; stop reading and wait for in-flight work.
    Drain,
    /// Draining finished.
    Stop,
    /// Stop immediately from any state.
    Abort,
}

/// Lifecycle state manager.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    session_id: SessionId,
    state: ServerState,
}

impl Lifecycle {
    /// Constructs a lifecycle controller for the given session.
    #[must_use]
    pub const fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: ServerState::Init,
        }
    }

    /// Returns the owning session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Applies a lifecycle event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the supplied event is
    /// not allowed from the current state.
    pub fn transition(&mut self, event: LifecycleEvent) -> LifecycleResult<ServerState> {
        let next = match (self.state, event) {
            (ServerState::Init, LifecycleEvent::Start) => Some(ServerState::Serving),
            (ServerState::Serving, LifecycleEvent::Drain) => Some(ServerState::Draining),
            (ServerState::Draining | ServerState::Stopped, LifecycleEvent::Stop)
            | (_, LifecycleEvent::Abort) => Some(ServerState::Stopped),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                session_id: self.session_id,
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            debug!(
                session_id = %self.session_id,
                ?self.state,
                ?next_state,
                ?event,
                "server lifecycle transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid lifecycle transition from {from:?} via {event:?} for session {session_id}")]
    InvalidTransition {
        /// Session whose transition failed.
        session_id: SessionId,
        /// State prior to the attempted transition.
        from: ServerState,
        /// Event that triggered the failure.
        event: LifecycleEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
