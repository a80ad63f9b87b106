//! Server-wide counters reported by `show status`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bes_core::StatusResponse;
use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct ServerStatus {
    started: DateTime<Utc>,
    started_at: Instant,
    connections: AtomicU64,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStatus {
    pub fn new() -> Self {
        Self {
            started: Utc::now(),
            started_at: Instant::now(),
            connections: AtomicU64::new(0),
        }
    }

    /// Counts a new connection and returns its number (starting at 0).
    pub fn record_connection(&self) -> u64 {
        self.connections.fetch_add(1, Ordering::Relaxed)
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatusResponse {
        StatusResponse {
            started: self.started,
            uptime_secs: self.started_at.elapsed().as_secs(),
            connections: self.connections(),
            pid: std::process::id(),
        }
    }
}
