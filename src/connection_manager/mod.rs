//! Live connection tracking shared by the SSE and WebSocket transports.
//!
//! Both transports register here with the same capability: an outbound text
//! channel plus disconnect detection. The registry owns the membership set,
//! keeps the per-protocol gauges in sync, and isolates per-connection send
//! failures so one broken peer never affects the rest.

mod registry;
mod types;

pub use registry::{BroadcastOutcome, ConnectionRegistry};
pub use types::{ConnectionHandle, ConnectionId, Protocol, SendError};
