use crate::delivery::transport::{DeliveryError, Transport};
use std::sync::Arc;
use tdoacore::telemetry::{Counter, LogManager, MetricsRecorder};
use tdoacore::DetectionPayload;

/// Final result of one `deliver` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { routed: bool },
    /// Both the direct attempt and the single relay attempt failed.
    Failed {
        direct: DeliveryError,
        relay: DeliveryError,
    },
}

/// Sends detections to the collector, falling back once to the peer relay.
pub struct DeliveryClient<T: Transport> {
    transport: T,
    collector_url: String,
    peer_url: String,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<T: Transport> DeliveryClient<T> {
    pub fn new(
        transport: T,
        collector_url: impl Into<String>,
        peer_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            collector_url: collector_url.into(),
            peer_url: peer_url.into(),
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new("delivery"),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn collector_url(&self) -> &str {
        &self.collector_url
    }

    /// Direct attempt, then at most one relay attempt through the peer.
    ///
    /// The payload is forwarded unmodified on both legs; only the peer's relay
    /// server marks it as routed.
    pub async fn deliver(&self, payload: &DetectionPayload) -> DeliveryOutcome {
        let direct = match self.deliver_direct(payload).await {
            Ok(()) => {
                self.metrics.record(Counter::DeliveredDirect);
                return DeliveryOutcome::Delivered { routed: false };
            }
            Err(err) => err,
        };

        self.logger.warn(&format!(
            "collector unreachable for {} ({}), relaying via {}",
            payload.node_id, direct, self.peer_url
        ));

        match self.transport.post(&self.peer_url, payload).await {
            Ok(()) => {
                self.metrics.record(Counter::DeliveredRelayed);
                self.logger.record(&format!(
                    "detection {} at {:.6} relayed via {}",
                    payload.node_id, payload.timestamp, self.peer_url
                ));
                DeliveryOutcome::Delivered { routed: true }
            }
            Err(relay) => {
                self.metrics.record(Counter::DeliveryFailed);
                self.logger.warn(&format!(
                    "delivery of {} at {:.6} abandoned: relay failed ({})",
                    payload.node_id, payload.timestamp, relay
                ));
                DeliveryOutcome::Failed { direct, relay }
            }
        }
    }

    /// Single attempt straight to the collector. Never falls back.
    pub async fn deliver_direct(&self, payload: &DetectionPayload) -> Result<(), DeliveryError> {
        self.transport.post(&self.collector_url, payload).await
    }
}
