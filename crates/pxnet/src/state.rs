//! Lock-free connection state tracking.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::trace;

use pxnet_transport_traits::ConnectionState;

use crate::error::InvalidTransition;

/// Tracks the [`ConnectionState`] of one connector.
///
/// Reads never block. Transitions are compare-and-swap so that two racing
/// `connect` calls cannot both leave `Disconnected`.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: AtomicU8,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Create a state machine in `Disconnected`.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
        }
    }

    /// Current state.
    pub fn current(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if that is legal from the current state.
    ///
    /// Returns the state that was replaced.
    pub fn transition(&self, next: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let from = ConnectionState::from_u8(current);
            if !from.can_transition_to(next) {
                return Err(InvalidTransition { from, to: next });
            }
            match self.state.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    trace!(%from, to = %next, "connection state transition");
                    return Ok(from);
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Move `from` → `to` only if the machine is exactly in `from`.
    pub fn try_transition(
        &self,
        from: ConnectionState,
        to: ConnectionState,
    ) -> Result<(), InvalidTransition> {
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { from, to });
        }
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| trace!(%from, %to, "connection state transition"))
            .map_err(|actual| InvalidTransition {
                from: ConnectionState::from_u8(actual),
                to,
            })
    }
}
