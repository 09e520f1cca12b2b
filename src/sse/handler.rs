//! SSE handler implementation.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::connection_manager::{ConnectionId, ConnectionRegistry, Protocol};
use crate::server::AppState;

/// SSE subscription handler
#[tracing::instrument(name = "sse.connect", skip(state))]
pub async fn sse_handler(State(state): State<AppState>) -> Response {
    let (tx, rx) = mpsc::channel::<String>(state.settings.broadcast.channel_buffer);
    let handle = state.registry.register(Protocol::Sse, tx);
    let connection_id = handle.id;

    tracing::info!(connection_id = %connection_id, "SSE client connected");

    // Dedicated ticker for this subscriber; it stops itself on send failure.
    let broadcaster = state.broadcaster.clone();
    let ticker = tokio::spawn(async move {
        broadcaster.drive_sse(handle).await;
    });

    let stream = create_sse_stream(rx, connection_id, state.registry.clone(), ticker);

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// Create the SSE event stream
fn create_sse_stream(
    rx: mpsc::Receiver<String>,
    connection_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    ticker: JoinHandle<()>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    // Dropped when the client goes away and the stream ends.
    let cleanup_guard = CleanupGuard {
        connection_id,
        registry,
        ticker,
    };

    async_stream::stream! {
        let _guard = cleanup_guard;

        let mut messages = ReceiverStream::new(rx);
        while let Some(text) = messages.next().await {
            yield Ok(Event::default().data(text));
        }
    }
}

/// Guard that performs cleanup when dropped
struct CleanupGuard {
    connection_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    ticker: JoinHandle<()>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.ticker.abort();
        self.registry.unregister(self.connection_id);
        tracing::info!(connection_id = %self.connection_id, "SSE client disconnected");
    }
}
