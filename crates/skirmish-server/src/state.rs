use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::registry::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new(config.timing.clone()));
        Self {
            registry,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        }
    }
}

/// RAII guard that decrements a counter on drop.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
