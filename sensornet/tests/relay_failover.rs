mod common;

use common::{http_client, spawn_recording_collector, unreachable_url};
use sensornet::relay::spawn_relay_server;
use sensornet::{DeliveryClient, DeliveryError, DeliveryOutcome, HttpTransport};
use std::sync::Arc;
use tdoacore::DetectionPayload;

type PeerClient = Arc<DeliveryClient<HttpTransport>>;

/// Starts a peer whose relay forwards to `collector_url`.
fn spawn_peer_with_client(collector_url: &str) -> (String, PeerClient) {
    let peer_client = Arc::new(http_client(collector_url, &unreachable_url()));
    let (addr, _task) =
        spawn_relay_server(peer_client.clone(), ([127, 0, 0, 1], 0).into()).unwrap();
    (format!("http://{}/data", addr), peer_client)
}

fn spawn_peer(collector_url: &str) -> String {
    spawn_peer_with_client(collector_url).0
}

#[tokio::test]
async fn unreachable_collector_is_bypassed_through_peer_relay() {
    let (collector_url, received) = spawn_recording_collector();
    let relay_url = spawn_peer(&collector_url);
    let origin = http_client(&unreachable_url(), &relay_url);

    let payload = DetectionPayload::new("ESP32_1", 0.200);
    let outcome = origin.deliver(&payload).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered { routed: true });

    let received = received.lock().unwrap().clone();
    assert_eq!(received, vec![payload.relayed()]);
    assert!(received[0].routed);
}

#[tokio::test]
async fn reachable_collector_receives_unrouted_payload() {
    let (collector_url, received) = spawn_recording_collector();
    let origin = http_client(&collector_url, &unreachable_url());

    let outcome = origin.deliver(&DetectionPayload::new("ESP32_2", 0.215)).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered { routed: false });
    assert!(!received.lock().unwrap()[0].routed);
}

#[tokio::test]
async fn relay_that_cannot_reach_collector_reports_bad_gateway() {
    let (relay_url, peer_client) = spawn_peer_with_client(&unreachable_url());
    let origin = http_client(&unreachable_url(), &relay_url);

    let outcome = origin.deliver(&DetectionPayload::new("ESP32_1", 1.0)).await;
    match outcome {
        DeliveryOutcome::Failed { direct, relay } => {
            assert!(matches!(direct, DeliveryError::NetworkUnreachable(_)));
            assert_eq!(relay, DeliveryError::Rejected { status: 502 });
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let peer_metrics = peer_client.metrics().snapshot();
    assert_eq!(peer_metrics.relay_failed, 1);
    assert_eq!(peer_metrics.relay_forwarded, 0);
    assert_eq!(peer_metrics.relay_rejected, 0);
}

#[tokio::test]
async fn malformed_body_is_rejected_and_listener_keeps_serving() {
    let (collector_url, received) = spawn_recording_collector();
    let relay_url = spawn_peer(&collector_url);
    let http = reqwest::Client::new();

    let bad = http
        .post(&relay_url)
        .header("content-type", "application/json")
        .body("{\"id\": \"ESP32_1\", \"time\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);

    let good = http
        .post(&relay_url)
        .json(&DetectionPayload::new("ESP32_1", 2.0))
        .send()
        .await
        .unwrap();
    assert_eq!(good.status(), 200);
    let body: serde_json::Value = good.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"status": "success"}));
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn already_routed_payload_is_not_relayed_again() {
    let (collector_url, received) = spawn_recording_collector();
    let relay_url = spawn_peer(&collector_url);

    let resp = reqwest::Client::new()
        .post(&relay_url)
        .json(&DetectionPayload::new("ESP32_3", 3.0).relayed())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (collector_url, _received) = spawn_recording_collector();
    let relay_url = spawn_peer(&collector_url);
    let base = relay_url.trim_end_matches("/data");

    let resp = reqwest::get(format!("{}/nonexistent", base)).await.unwrap();
    assert_eq!(resp.status(), 404);
}
