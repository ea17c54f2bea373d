//! Service metrics tracking.
//!
//! In-process connection counters, served as JSON next to the pipeline's
//! queue statistics.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Tracks connection counts for the `/stats` endpoint.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    /// Total number of connections accepted
    total_connections: Arc<AtomicU64>,

    /// Number of currently open WebSocket connections
    active_connections: Arc<AtomicU32>,

    /// Maximum number of concurrent connections observed
    max_concurrent_connections: Arc<AtomicU32>,

    /// Server start time
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            total_connections: Arc::new(AtomicU64::new(0)),
            active_connections: Arc::new(AtomicU32::new(0)),
            max_concurrent_connections: Arc::new(AtomicU32::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        self.max_concurrent_connections
            .fetch_max(active, Ordering::SeqCst);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    /// Get all metrics as a serde_json::Value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_seconds": self.start_time.elapsed().as_secs(),
            "total_connections": self.total_connections.load(Ordering::SeqCst),
            "active_connections": self.active_connections.load(Ordering::SeqCst),
            "max_concurrent_connections": self.max_concurrent_connections.load(Ordering::SeqCst),
        })
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
