//! Configuration loading and validation.

mod settings;

pub use settings::{BroadcastConfig, ServerConfig, Settings};
