//! Health: control channel connectivity flag.
//!
//! Flipped by the client loop whenever the top-level stream opens or
//! breaks. Cloning shares the same flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ChannelHealth {
    healthy: Arc<AtomicBool>,
}

impl ChannelHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_healthy(&self, healthy: bool) {
        let previous = self.healthy.swap(healthy, Ordering::SeqCst);
        if previous != healthy {
            info!(healthy, "Control channel health changed");
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
