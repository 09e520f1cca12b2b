//! Server-Sent Events delivery.
//!
//! Each subscriber gets its own ticker task, so pacing and failure are fully
//! per-client: a stalled or departed stream only tears down its own
//! connection.
//!
//! # Endpoint
//!
//! `GET /sse` — `text/event-stream`; one `data: <json>` event per tick with
//! payload `{ts, seq, protocol, client_id}`.

mod handler;

pub use handler::sse_handler;
