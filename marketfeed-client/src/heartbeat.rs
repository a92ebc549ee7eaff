//! Liveness tracking for the established connection
//!
//! The monitor is a pure observer: it records inbound traffic and answers
//! health queries, but never forces a reconnect. Any inbound frame counts
//! as liveness, not only heartbeat replies. The probe interval itself lives
//! in the connection loop so it stops whenever the connection does.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use marketfeed_core::HeartbeatPayload;

#[derive(Debug, Default)]
struct HeartbeatRecord {
    last_received_at: Option<DateTime<Utc>>,
    connection_id: Option<String>,
}

/// Tracks when the connection last showed signs of life
#[derive(Debug)]
pub struct HeartbeatMonitor {
    threshold: Duration,
    record: RwLock<HeartbeatRecord>,
}

impl HeartbeatMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            record: RwLock::new(HeartbeatRecord::default()),
        }
    }

    /// Record arrival of any inbound frame.
    pub fn record_frame(&self) {
        self.record.write().last_received_at = Some(Utc::now());
    }

    /// Record a decoded heartbeat frame, capturing the server connection id.
    pub fn record_heartbeat(&self, payload: &HeartbeatPayload) {
        let mut record = self.record.write();
        record.last_received_at = Some(Utc::now());
        if payload.connection_id.is_some() {
            record.connection_id = payload.connection_id.clone();
        }
    }

    /// Timestamp of the most recent inbound frame, if any arrived yet.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.record.read().last_received_at
    }

    /// Connection id reported by the server's heartbeat frames.
    pub fn connection_id(&self) -> Option<String> {
        self.record.read().connection_id.clone()
    }

    /// Whether the gap since the last inbound frame is under the threshold.
    pub fn is_healthy(&self) -> bool {
        self.healthy_at(Utc::now())
    }

    fn healthy_at(&self, now: DateTime<Utc>) -> bool {
        let threshold = chrono::Duration::from_std(self.threshold)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));
        match self.record.read().last_received_at {
            Some(last) => now.signed_duration_since(last) < threshold,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_before_any_frame() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(90));
        assert!(monitor.last_heartbeat().is_none());
        assert!(!monitor.is_healthy());
    }

    #[test]
    fn any_frame_counts_as_liveness() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(90));
        monitor.record_frame();
        let last = monitor.last_heartbeat().expect("frame recorded");
        assert!(monitor.healthy_at(last + chrono::Duration::seconds(89)));
        assert!(!monitor.healthy_at(last + chrono::Duration::seconds(91)));
    }

    #[test]
    fn heartbeat_captures_connection_id() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(90));
        monitor.record_heartbeat(&HeartbeatPayload {
            timestamp: Utc::now(),
            connection_id: Some("conn-42".to_string()),
        });
        assert_eq!(monitor.connection_id().as_deref(), Some("conn-42"));

        // A later heartbeat without an id keeps the known one
        monitor.record_heartbeat(&HeartbeatPayload {
            timestamp: Utc::now(),
            connection_id: None,
        });
        assert_eq!(monitor.connection_id().as_deref(), Some("conn-42"));
    }
}
