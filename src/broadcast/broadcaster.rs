use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::config::BroadcastConfig;
use crate::connection_manager::{
    BroadcastOutcome, ConnectionHandle, ConnectionRegistry, Protocol, SendError,
};
use crate::stats::StatsRegistry;

use super::payload::Payload;

/// Drives periodic delivery: the shared WebSocket fan-out loop and the
/// per-subscriber SSE tickers.
///
/// A connection is either live or gone: the first failed send unregisters it
/// and that is terminal. Reconnection is a fresh registration at the HTTP
/// boundary.
pub struct Broadcaster {
    config: BroadcastConfig,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<StatsRegistry>,
    clock: Arc<dyn Clock>,
    shutdown: broadcast::Sender<()>,
}

impl Broadcaster {
    pub fn new(
        config: BroadcastConfig,
        registry: Arc<ConnectionRegistry>,
        stats: Arc<StatsRegistry>,
        clock: Arc<dyn Clock>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            config,
            registry,
            stats,
            clock,
            shutdown,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms)
    }

    /// Build the next payload for a connection, advancing its sequence
    /// counter.
    pub fn next_payload(&self, handle: &ConnectionHandle) -> Payload {
        Payload {
            ts: self.clock.now_millis(),
            seq: handle.next_seq(),
            protocol: handle.protocol,
            client_id: handle.id,
        }
    }

    /// One shared fan-out pass over all WebSocket connections.
    ///
    /// Each delivered connection counts exactly one sent message; every
    /// failed connection is unregistered before returning.
    pub async fn tick(&self) -> BroadcastOutcome {
        let outcome = self
            .registry
            .broadcast_with(Protocol::Ws, |handle| self.next_payload(handle).to_json())
            .await;

        for id in &outcome.failed {
            self.registry.unregister(*id);
        }
        self.stats.record_messages_sent(outcome.delivered() as u64);

        if !outcome.failed.is_empty() {
            tracing::info!(
                failed = outcome.failed.len(),
                delivered = outcome.delivered(),
                "Dropped broken connections after broadcast"
            );
        }

        outcome
    }

    /// One delivery to a single SSE subscriber. A failure unregisters the
    /// connection before the error is returned.
    pub async fn sse_tick(&self, handle: &ConnectionHandle) -> Result<(), SendError> {
        let payload = self.next_payload(handle);
        match self.registry.send_to(handle.id, payload.to_json()).await {
            Ok(()) => {
                self.stats.record_message_sent();
                Ok(())
            }
            Err(err) => {
                tracing::debug!(
                    connection_id = %handle.id,
                    error = %err,
                    "SSE send failed, dropping connection"
                );
                self.registry.unregister(handle.id);
                Err(err)
            }
        }
    }

    /// The shared WebSocket broadcast loop. Runs until shutdown.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let mut timer = tokio::time::interval(self.tick_interval());

        // Skip the immediate first tick so subscribers get a full interval
        // before the first payload.
        timer.tick().await;

        tracing::info!(
            tick_interval_ms = self.config.tick_interval_ms,
            "Broadcast loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Broadcast loop received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    if self.registry.count(Protocol::Ws) == 0 {
                        continue;
                    }
                    let outcome = self.tick().await;
                    tracing::debug!(
                        delivered = outcome.delivered(),
                        failed = outcome.failed.len(),
                        "Broadcast tick completed"
                    );
                }
            }
        }

        tracing::info!("Broadcast loop stopped");
    }

    /// Per-subscriber SSE ticker. The first payload goes out immediately;
    /// the loop ends on send failure or shutdown.
    pub async fn drive_sse(&self, handle: Arc<ConnectionHandle>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut timer = tokio::time::interval(self.tick_interval());

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = timer.tick() => {
                    if self.sse_tick(handle.as_ref()).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tokio::sync::mpsc;

    struct TestHarness {
        stats: Arc<StatsRegistry>,
        registry: Arc<ConnectionRegistry>,
        clock: Arc<ManualClock>,
        shutdown: broadcast::Sender<()>,
        broadcaster: Broadcaster,
    }

    fn harness(tick_interval_ms: u64) -> TestHarness {
        let stats = Arc::new(StatsRegistry::new());
        let registry = Arc::new(ConnectionRegistry::new(
            stats.clone(),
            Duration::from_millis(100),
        ));
        let clock = Arc::new(ManualClock::new(1_000));
        let (shutdown, _) = broadcast::channel(1);
        let broadcaster = Broadcaster::new(
            BroadcastConfig {
                tick_interval_ms,
                send_timeout_ms: 100,
                channel_buffer: 8,
            },
            registry.clone(),
            stats.clone(),
            clock.clone(),
            shutdown.clone(),
        );
        TestHarness {
            stats,
            registry,
            clock,
            shutdown,
            broadcaster,
        }
    }

    #[tokio::test]
    async fn test_next_payload_advances_sequence() {
        let h = harness(1_000);
        let (tx, _rx) = mpsc::channel(4);
        let handle = h.registry.register(Protocol::Ws, tx);

        let first = h.broadcaster.next_payload(&handle);
        h.clock.advance(25);
        let second = h.broadcaster.next_payload(&handle);

        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(first.ts, 1_000);
        assert_eq!(second.ts, 1_025);
        assert_eq!(first.client_id, handle.id);
        assert_eq!(first.protocol, Protocol::Ws);
    }

    #[tokio::test]
    async fn test_tick_delivers_to_every_ws_connection() {
        let h = harness(1_000);
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        h.registry.register(Protocol::Ws, tx_a);
        h.registry.register(Protocol::Ws, tx_b);

        let outcome = h.broadcaster.tick().await;

        assert_eq!(outcome.delivered(), 2);
        assert!(outcome.failed.is_empty());
        assert_eq!(h.stats.snapshot().messages_sent, 2);

        for rx in [&mut rx_a, &mut rx_b] {
            let payload: Payload = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(payload.seq, 0);
            assert_eq!(payload.protocol, Protocol::Ws);
        }
    }

    #[tokio::test]
    async fn test_tick_unregisters_failed_connections() {
        let h = harness(1_000);
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, rx_b) = mpsc::channel(4);
        h.registry.register(Protocol::Ws, tx_a);
        let broken = h.registry.register(Protocol::Ws, tx_b);
        drop(rx_b);

        let outcome = h.broadcaster.tick().await;

        assert_eq!(outcome.failed, vec![broken.id]);
        assert_eq!(outcome.delivered(), 1);
        assert_eq!(h.stats.snapshot().ws_clients, 1);
        assert_eq!(h.stats.snapshot().messages_sent, 1);
        assert!(rx_a.recv().await.is_some());
        assert!(h.registry.get(broken.id).is_none());
    }

    #[tokio::test]
    async fn test_sse_tick_scenario() {
        // Three subscribers, one tick each: every stream sees seq 0 and the
        // counter reads 3. Drop one, tick the rest: two seq-1 payloads and a
        // total of 5.
        let h = harness(1_000);
        let mut subscribers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::channel(4);
            let handle = h.registry.register(Protocol::Sse, tx);
            subscribers.push((handle, rx));
        }

        for (handle, rx) in subscribers.iter_mut() {
            h.broadcaster.sse_tick(handle.as_ref()).await.unwrap();
            let payload: Payload = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(payload.seq, 0);
            assert_eq!(payload.protocol, Protocol::Sse);
        }
        assert_eq!(h.stats.snapshot().messages_sent, 3);
        assert_eq!(h.stats.snapshot().sse_clients, 3);

        let (gone, gone_rx) = subscribers.pop().unwrap();
        drop(gone_rx);
        let result = h.broadcaster.sse_tick(gone.as_ref()).await;
        assert_eq!(result, Err(SendError::Closed));
        assert_eq!(h.stats.snapshot().sse_clients, 2);

        for (handle, rx) in subscribers.iter_mut() {
            h.broadcaster.sse_tick(handle.as_ref()).await.unwrap();
            let payload: Payload = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(payload.seq, 1);
        }
        assert_eq!(h.stats.snapshot().messages_sent, 5);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness(10);
        let shutdown = h.shutdown.clone();
        let task = tokio::spawn(async move { h.broadcaster.run().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop should stop")
            .expect("loop should not panic");
    }

    #[tokio::test]
    async fn test_run_delivers_on_interval() {
        let h = harness(10);
        let (tx, mut rx) = mpsc::channel(16);
        h.registry.register(Protocol::Ws, tx);

        let shutdown = h.shutdown.clone();
        let task = tokio::spawn(async move { h.broadcaster.run().await });

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("should receive a payload")
            .expect("channel should stay open");
        let payload: Payload = serde_json::from_str(&first).unwrap();
        assert_eq!(payload.seq, 0);

        shutdown.send(()).unwrap();
        let _ = task.await;
    }

    #[tokio::test]
    async fn test_drive_sse_stops_when_subscriber_goes_away() {
        let h = harness(10);
        let (tx, mut rx) = mpsc::channel(4);
        let handle = h.registry.register(Protocol::Sse, tx);

        let broadcaster = h.broadcaster;
        let id = handle.id;
        let registry = h.registry.clone();
        let task = tokio::spawn(async move { broadcaster.drive_sse(handle).await });

        // First payload arrives immediately.
        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("should receive a payload")
            .expect("channel should stay open");
        let payload: Payload = serde_json::from_str(&first).unwrap();
        assert_eq!(payload.seq, 0);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("ticker should stop")
            .expect("ticker should not panic");
        assert!(registry.get(id).is_none());
    }
}
