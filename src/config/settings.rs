use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Milliseconds between payload ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Upper bound on a single send before the connection counts as stalled.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Outbound channel depth per connection.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_send_timeout_ms() -> u64 {
    5000
}

fn default_channel_buffer() -> usize {
    32
}

impl Settings {
    pub fn new() -> Result<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("broadcast.tick_interval_ms", default_tick_interval_ms() as i64)?
            .set_default("broadcast.send_timeout_ms", default_send_timeout_ms() as i64)?
            .set_default("broadcast.channel_buffer", default_channel_buffer() as i64)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER__HOST, SERVER__PORT, BROADCAST__TICK_INTERVAL_MS, etc.
            .add_source(Environment::default().separator("__").try_parsing(true));

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 3000);

        let broadcast = BroadcastConfig::default();
        assert_eq!(broadcast.tick_interval_ms, 1000);
        assert_eq!(broadcast.send_timeout_ms, 5000);
        assert_eq!(broadcast.channel_buffer, 32);
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broadcast: BroadcastConfig::default(),
        };
        assert_eq!(settings.server_addr(), "127.0.0.1:8080");
    }
}
