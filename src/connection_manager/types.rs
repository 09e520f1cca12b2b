//! Connection handle and related types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport a connection was accepted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Sse,
    Ws,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Sse => "sse",
            Protocol::Ws => "ws",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier assigned at registration. Monotonically increasing across the
/// whole process and never reused, so churned clients keep distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a send attempt. Disconnects are reported explicitly instead of
/// being inferred from a catch-all error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Handle for a single outbound push connection.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub protocol: Protocol,
    pub sender: mpsc::Sender<String>,
    pub connected_at: DateTime<Utc>,
    seq: AtomicU64,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, protocol: Protocol, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            protocol,
            sender,
            connected_at: Utc::now(),
            seq: AtomicU64::new(0),
        }
    }

    /// Return the current sequence number and advance it. Starts at 0.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}
