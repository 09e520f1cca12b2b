use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::broadcast::Broadcaster;
use crate::clock::SystemClock;
use crate::config::Settings;
use crate::connection_manager::ConnectionRegistry;
use crate::stats::StatsRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub stats: Arc<StatsRegistry>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(settings: Settings, shutdown: broadcast::Sender<()>) -> Self {
        let stats = Arc::new(StatsRegistry::new());
        let registry = Arc::new(ConnectionRegistry::new(
            stats.clone(),
            Duration::from_millis(settings.broadcast.send_timeout_ms),
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            settings.broadcast.clone(),
            registry.clone(),
            stats.clone(),
            Arc::new(SystemClock),
            shutdown,
        ));

        Self {
            settings: Arc::new(settings),
            stats,
            registry,
            broadcaster,
        }
    }
}
