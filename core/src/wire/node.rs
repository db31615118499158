use crate::geometry::Point2;
use serde::{Deserialize, Serialize};

/// Identity and fixed placement of a sensor node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorNode {
    pub id: String,
    pub position: Point2,
    /// Relay endpoint of the single designated fallback peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_address: Option<String>,
}

impl SensorNode {
    pub fn new(id: impl Into<String>, position: Point2) -> Self {
        Self {
            id: id.into(),
            position,
            peer_address: None,
        }
    }

    pub fn with_peer(mut self, peer_address: impl Into<String>) -> Self {
        self.peer_address = Some(peer_address.into());
        self
    }
}
