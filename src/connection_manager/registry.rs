use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::stats::StatsRegistry;

use super::types::{ConnectionHandle, ConnectionId, Protocol, SendError};

/// Result of one fan-out pass over a membership snapshot.
#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    /// Connections that were live when the snapshot was taken.
    pub attempted: usize,
    /// Connections whose send failed or timed out. The caller is expected to
    /// unregister each of these.
    pub failed: Vec<ConnectionId>,
}

impl BroadcastOutcome {
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed.len()
    }
}

/// Manages the set of live outbound connections.
pub struct ConnectionRegistry {
    /// connection_id -> ConnectionHandle
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    next_id: AtomicU64,
    stats: Arc<StatsRegistry>,
    send_timeout: Duration,
}

impl ConnectionRegistry {
    pub fn new(stats: Arc<StatsRegistry>, send_timeout: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(0),
            stats,
            send_timeout,
        }
    }

    /// Register a new connection and bump the matching protocol gauge.
    pub fn register(
        &self,
        protocol: Protocol,
        sender: mpsc::Sender<String>,
    ) -> Arc<ConnectionHandle> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = Arc::new(ConnectionHandle::new(id, protocol, sender));
        self.connections.insert(id, handle.clone());

        match protocol {
            Protocol::Sse => self.stats.increment_sse(),
            Protocol::Ws => self.stats.increment_ws(),
        }

        tracing::info!(connection_id = %id, protocol = %protocol, "Connection registered");

        handle
    }

    /// Unregister a connection. Idempotent: removing an id that is already
    /// gone does nothing, and the gauge is only decremented when an entry was
    /// actually present.
    pub fn unregister(&self, id: ConnectionId) {
        if let Some((_, handle)) = self.connections.remove(&id) {
            match handle.protocol {
                Protocol::Sse => self.stats.decrement_sse(),
                Protocol::Ws => self.stats.decrement_ws(),
            }

            let connected_secs = (chrono::Utc::now() - handle.connected_at).num_seconds();
            tracing::info!(
                connection_id = %id,
                protocol = %handle.protocol,
                connected_secs = connected_secs,
                "Connection unregistered"
            );
        }
    }

    /// Attempt delivery to one connection. Does not retry; on failure the
    /// caller unregisters the connection.
    pub async fn send_to(&self, id: ConnectionId, text: String) -> Result<(), SendError> {
        let handle = self
            .connections
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(SendError::Closed)?;
        self.send_with_timeout(&handle, text).await
    }

    /// Fan a payload out to every live connection of the given transport.
    ///
    /// Membership is snapshotted at call start: connections registered while
    /// the fan-out runs are picked up next tick, and concurrent unregisters
    /// surface as individual failures rather than breaking the pass. Failures
    /// are collected, never raised.
    pub async fn broadcast_with<F>(&self, protocol: Protocol, mut make: F) -> BroadcastOutcome
    where
        F: FnMut(&ConnectionHandle) -> String,
    {
        let targets: Vec<Arc<ConnectionHandle>> = self
            .connections
            .iter()
            .filter(|entry| entry.value().protocol == protocol)
            .map(|entry| entry.value().clone())
            .collect();
        let attempted = targets.len();

        let send_timeout = self.send_timeout;
        let sends = targets.iter().map(|handle| {
            let text = make(handle.as_ref());
            let id = handle.id;
            let sender = handle.sender.clone();
            async move {
                match timeout(send_timeout, sender.send(text)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(_)) => {
                        tracing::debug!(connection_id = %id, "Send failed, peer channel closed");
                        Some(id)
                    }
                    Err(_) => {
                        tracing::debug!(
                            connection_id = %id,
                            timeout_ms = send_timeout.as_millis() as u64,
                            "Send timed out, connection may be stalled"
                        );
                        Some(id)
                    }
                }
            }
        });

        let failed: Vec<ConnectionId> = join_all(sends).await.into_iter().flatten().collect();

        BroadcastOutcome { attempted, failed }
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    pub fn count(&self, protocol: Protocol) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().protocol == protocol)
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    async fn send_with_timeout(
        &self,
        handle: &ConnectionHandle,
        text: String,
    ) -> Result<(), SendError> {
        match timeout(self.send_timeout, handle.sender.send(text)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendError::Closed),
            Err(_) => Err(SendError::Timeout(self.send_timeout)),
        }
    }
}
