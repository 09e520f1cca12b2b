//! WebSocket delivery.
//!
//! All WebSocket subscribers share the broadcast loop's tick. The handler
//! here only moves bytes: outbound payloads flow from the connection's
//! channel into the socket, and inbound frames are watched solely for
//! disconnect detection.

mod handler;

pub use handler::ws_handler;
