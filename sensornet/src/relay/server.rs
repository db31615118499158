use crate::delivery::{DeliveryClient, Transport};
use crate::reply::{error_reply, success_reply, MAX_BODY_BYTES};
use anyhow::Context;
use log::{info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tdoacore::telemetry::Counter;
use tdoacore::DetectionPayload;
use tokio::task::JoinHandle;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::Filter;

/// `POST /data` on a sensor node: forwards a peer's detection to the collector.
pub fn relay_routes<T>(
    client: Arc<DeliveryClient<T>>,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone + Send + Sync + 'static
where
    T: Transport + 'static,
{
    let client_filter = warp::any().map(move || client.clone());

    warp::path("data")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(client_filter)
        .and_then(handle_relay)
}

async fn handle_relay<T: Transport>(
    body: Bytes,
    client: Arc<DeliveryClient<T>>,
) -> Result<Response, Infallible> {
    let payload: DetectionPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("relay: rejecting malformed payload: {}", err);
            client.metrics().record(Counter::RelayRejected);
            return Ok(error_reply(StatusCode::BAD_REQUEST, &err.to_string()));
        }
    };

    if payload.routed {
        warn!(
            "relay: refusing second hop for {} at {:.6}",
            payload.node_id, payload.timestamp
        );
        client.metrics().record(Counter::RelayRejected);
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "payload has already been relayed",
        ));
    }

    info!(
        "relay: forwarding {} at {:.6} to {}",
        payload.node_id,
        payload.timestamp,
        client.collector_url()
    );
    match client.deliver_direct(&payload.relayed()).await {
        Ok(()) => {
            client.metrics().record(Counter::RelayForwarded);
            Ok(success_reply(StatusCode::OK))
        }
        Err(err) => {
            warn!("relay: forwarding {} failed: {}", payload.node_id, err);
            client.metrics().record(Counter::RelayFailed);
            Ok(error_reply(StatusCode::BAD_GATEWAY, &err.to_string()))
        }
    }
}

/// Binds the relay listener and serves it on its own task.
pub fn spawn_relay_server<T>(
    client: Arc<DeliveryClient<T>>,
    addr: SocketAddr,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)>
where
    T: Transport + 'static,
{
    let (bound, server) = warp::serve(relay_routes(client))
        .try_bind_ephemeral(addr)
        .with_context(|| format!("binding relay listener on {}", addr))?;
    info!("relay server listening on {}", bound);
    Ok((bound, tokio::spawn(server)))
}
