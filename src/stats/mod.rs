//! Delivery statistics shared by every connection handler and the broadcast loop.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde::Serialize;

#[derive(Debug)]
struct StatsInner {
    sse_clients: u64,
    ws_clients: u64,
    messages_sent: u64,
    started_at: Instant,
}

/// Aggregate service statistics.
///
/// The client gauges mirror the live connection set; `messages_sent` counts
/// successful deliveries since the last reset. All reads and writes go through
/// a single lock so a snapshot never observes a half-applied update.
#[derive(Debug)]
pub struct StatsRegistry {
    inner: RwLock<StatsInner>,
}

/// Point-in-time copy of the statistics, serialized for the stats endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub sse_clients: u64,
    pub ws_clients: u64,
    pub messages_sent: u64,
    /// Milliseconds since startup or the last reset.
    #[serde(rename = "uptime")]
    pub uptime_ms: u64,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StatsInner {
                sse_clients: 0,
                ws_clients: 0,
                messages_sent: 0,
                started_at: Instant::now(),
            }),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatsInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, StatsInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment_sse(&self) {
        self.write().sse_clients += 1;
    }

    pub fn decrement_sse(&self) {
        let mut inner = self.write();
        if inner.sse_clients == 0 {
            tracing::warn!("SSE client gauge already at zero, decrement ignored");
        } else {
            inner.sse_clients -= 1;
        }
    }

    pub fn increment_ws(&self) {
        self.write().ws_clients += 1;
    }

    pub fn decrement_ws(&self) {
        let mut inner = self.write();
        if inner.ws_clients == 0 {
            tracing::warn!("WebSocket client gauge already at zero, decrement ignored");
        } else {
            inner.ws_clients -= 1;
        }
    }

    /// Record one successful delivery.
    pub fn record_message_sent(&self) {
        self.write().messages_sent += 1;
    }

    /// Record a batch of successful deliveries in one lock acquisition.
    pub fn record_messages_sent(&self, count: u64) {
        if count > 0 {
            self.write().messages_sent += count;
        }
    }

    /// Zero the message counter and restart the uptime clock.
    ///
    /// The client gauges are left alone: they reflect live connections, not
    /// history.
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.messages_sent = 0;
        inner.started_at = Instant::now();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.read();
        StatsSnapshot {
            sse_clients: inner.sse_clients,
            ws_clients: inner.ws_clients,
            messages_sent: inner.messages_sent,
            uptime_ms: inner.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
