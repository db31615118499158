use crate::wire::NodeReport;
use std::time::{Duration, Instant};

/// Number of distinct sensors needed to close a window.
pub const REQUIRED_NODES: usize = 3;

/// In-progress correlation record for one acoustic event.
#[derive(Debug, Clone)]
pub(crate) struct EventWindow {
    pub id: u64,
    /// Timestamp of the first report; later reports match against it.
    pub anchor: f64,
    pub opened_at: Instant,
    records: Vec<NodeReport>,
}

impl EventWindow {
    pub fn open(id: u64, node_id: &str, timestamp: f64, now: Instant) -> Self {
        Self {
            id,
            anchor: timestamp,
            opened_at: now,
            records: vec![NodeReport {
                node_id: node_id.to_string(),
                timestamp,
            }],
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.records.iter().any(|r| r.node_id == node_id)
    }

    /// Adds a report from a node not yet present. Returns the new record count.
    pub fn insert(&mut self, node_id: &str, timestamp: f64) -> usize {
        debug_assert!(!self.contains(node_id));
        debug_assert!(self.records.len() < REQUIRED_NODES);
        self.records.push(NodeReport {
            node_id: node_id.to_string(),
            timestamp,
        });
        self.records.len()
    }

    pub fn is_complete(&self) -> bool {
        self.records.len() >= REQUIRED_NODES
    }

    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.opened_at) >= timeout
    }

    pub fn timestamp_of(&self, node_id: &str) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.node_id == node_id)
            .map(|r| r.timestamp)
    }

    pub fn tombstone(&self, now: Instant) -> Tombstone {
        Tombstone {
            id: self.id,
            anchor: self.anchor,
            closed_at: now,
        }
    }

    pub fn into_reports(self) -> Vec<NodeReport> {
        self.records
    }
}

/// Remains of a closed window, kept so that late reports can be recognised.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tombstone {
    pub id: u64,
    pub anchor: f64,
    pub closed_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_tracks_distinct_nodes() {
        let now = Instant::now();
        let mut window = EventWindow::open(7, "a", 0.2, now);
        assert!(window.contains("a"));
        assert!(!window.contains("b"));
        assert_eq!(window.insert("b", 0.21), 2);
        assert!(!window.is_complete());
        assert_eq!(window.insert("c", 0.215), 3);
        assert!(window.is_complete());
        assert_eq!(window.timestamp_of("b"), Some(0.21));
    }

    #[test]
    fn expiry_is_inclusive_of_timeout() {
        let now = Instant::now();
        let window = EventWindow::open(1, "a", 0.0, now);
        let timeout = Duration::from_millis(500);
        assert!(!window.is_expired(now + Duration::from_millis(499), timeout));
        assert!(window.is_expired(now + timeout, timeout));
    }
}
