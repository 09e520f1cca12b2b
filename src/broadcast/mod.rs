//! Periodic payload construction and delivery.
//!
//! WebSocket subscribers share one tick so they stay in lockstep; each SSE
//! subscriber is paced by its own timer so a slow stream only affects itself.

mod broadcaster;
mod payload;

pub use broadcaster::Broadcaster;
pub use payload::Payload;
