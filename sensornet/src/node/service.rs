use crate::delivery::{DeliveryClient, DeliveryOutcome, HttpTransport, Transport};
use crate::node::source::{ClockSource, DetectionSource};
use crate::relay::spawn_relay_server;
use crate::workflow::config::NodeConfig;
use anyhow::Context;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tdoacore::DetectionPayload;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Running sensor node: relay listener plus periodic detection task.
pub struct NodeHandle {
    pub relay_addr: SocketAddr,
    pub client: Arc<DeliveryClient<HttpTransport>>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Starts the node's two duties as independent tasks on the current runtime.
pub fn start_node<S: DetectionSource>(
    config: &NodeConfig,
    source: S,
) -> anyhow::Result<NodeHandle> {
    config.validate()?;
    let transport =
        HttpTransport::new(config.delivery_timeout()).context("building HTTP transport")?;
    let client = Arc::new(DeliveryClient::new(
        transport,
        &config.collector_url,
        &config.peer_url,
    ));

    let (relay_addr, relay_task) = spawn_relay_server(client.clone(), config.listen)?;
    let ticker_task = tokio::spawn(run_ticker(
        config.id.clone(),
        config.interval(),
        source,
        client.clone(),
    ));
    info!(
        "node {} at ({:.2}, {:.2}) reporting every {:?}",
        config.id,
        config.position.x,
        config.position.y,
        config.interval()
    );

    Ok(NodeHandle {
        relay_addr,
        client,
        tasks: vec![relay_task, ticker_task],
    })
}

pub async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    let handle = start_node(&config, ClockSource)?;
    tokio::signal::ctrl_c()
        .await
        .context("awaiting Ctrl+C to exit")?;
    info!("node {} shutting down", config.id);
    handle.shutdown();
    Ok(())
}

/// Each tick spawns its own delivery so a slow attempt never delays the next one.
async fn run_ticker<S, T>(
    node_id: String,
    period: Duration,
    source: S,
    client: Arc<DeliveryClient<T>>,
) where
    S: DetectionSource,
    T: Transport + 'static,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(timestamp) = source.poll() else {
            continue;
        };
        let payload = DetectionPayload::new(node_id.clone(), timestamp);
        let client = client.clone();
        tokio::spawn(async move {
            match client.deliver(&payload).await {
                DeliveryOutcome::Delivered { routed } => {
                    debug!(
                        "detection {} at {:.6} delivered (routed={})",
                        payload.node_id, payload.timestamp, routed
                    );
                }
                DeliveryOutcome::Failed { direct, relay } => {
                    warn!(
                        "detection {} at {:.6} lost: direct {}, relay {}",
                        payload.node_id, payload.timestamp, direct, relay
                    );
                }
            }
        });
    }
}
