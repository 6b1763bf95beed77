//! Connection state and client statistics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// First connect attempt in flight.
    Connecting,
    /// Transport open and channels declared.
    Connected,
    /// Connection lost; retrying.
    Reconnecting,
}

impl ConnectionState {
    /// Check whether frames can flow.
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Client statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    /// Transports successfully opened.
    pub connections: u64,
    /// Reconnect delays scheduled.
    pub reconnect_attempts: u64,
    /// Control commands written to the transport.
    pub commands_sent: u64,
    /// Inbound frames read from the transport.
    pub frames_received: u64,
    /// Inbound frames dropped as unparsable or schema-invalid.
    pub frames_malformed: u64,
    /// Data frames for channels without subscribers.
    pub frames_unrouted: u64,
    /// Callback invocations that completed.
    pub envelopes_delivered: u64,
    /// Callback invocations that panicked.
    pub callback_panics: u64,
    /// Subscription confirmations received.
    pub confirmations: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub connections: AtomicU64,
    pub reconnect_attempts: AtomicU64,
    pub commands_sent: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_malformed: AtomicU64,
    pub frames_unrouted: AtomicU64,
    pub envelopes_delivered: AtomicU64,
    pub callback_panics: AtomicU64,
    pub confirmations: AtomicU64,
}

impl StatsCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ClientStats {
        ClientStats {
            connections: self.connections.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            frames_unrouted: self.frames_unrouted.load(Ordering::Relaxed),
            envelopes_delivered: self.envelopes_delivered.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            confirmations: self.confirmations.load(Ordering::Relaxed),
        }
    }
}
