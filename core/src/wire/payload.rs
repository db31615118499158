use serde::{Deserialize, Serialize};

/// One sensor's observation of one acoustic event, as carried on the wire.
///
/// The JSON shape is `{"id": .., "routed": .., "time": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPayload {
    #[serde(rename = "id")]
    pub node_id: String,
    pub routed: bool,
    #[serde(rename = "time")]
    pub timestamp: f64,
}

impl DetectionPayload {
    /// Payload as created on the originating node. Never routed.
    pub fn new(node_id: impl Into<String>, timestamp: f64) -> Self {
        Self {
            node_id: node_id.into(),
            routed: false,
            timestamp,
        }
    }

    /// Copy of this payload marked as having crossed one relay hop.
    pub fn relayed(&self) -> Self {
        Self {
            routed: true,
            ..self.clone()
        }
    }
}
