//! Connection state tracking
//!
//! The WebSocket transport moves through a simple, one-way lifecycle:
//!
//! ```text
//! Disconnected → Connected → Closed
//! ```
//!
//! **Disconnected** is the constructed state; `open` performs the
//! handshake into **Connected**; any read/write failure or an explicit
//! `close` lands in **Closed**, which is terminal. Reconnection is the
//! caller's responsibility: construct a new client.

use std::sync::Mutex;

/// Lifecycle state of a WebSocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, no socket yet
    Disconnected,
    /// Handshake complete, read loop running
    Connected,
    /// Torn down; terminal
    Closed,
}

/// Shared, thread-safe holder for the connection state
pub(crate) struct StateTracker {
    state: Mutex<ConnectionState>,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set(&self, next: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }
}
