use std::sync::Arc;
use std::time::Instant;

use relay::Relay;

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    started_at: Instant,
}

impl AppState {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
