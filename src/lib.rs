// Core domain
pub mod broadcast;
pub mod clock;
pub mod connection_manager;
pub mod stats;

// Application layer
pub mod api;
pub mod server;
pub mod sse;
pub mod websocket;

// Supporting modules
pub mod config;
pub mod error;
