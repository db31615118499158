mod common;

use common::{spawn_recording_collector, spawn_slow_collector, unreachable_url};
use sensornet::node::{start_node, DetectionSource};
use sensornet::NodeConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tdoacore::{DetectionPayload, Point2};

/// Emits 1.0, 2.0, 3.0, ... on successive polls.
struct CountingSource(AtomicU64);

impl DetectionSource for CountingSource {
    fn poll(&self) -> Option<f64> {
        Some((self.0.fetch_add(1, Ordering::SeqCst) + 1) as f64)
    }
}

fn node_config(collector_url: String) -> NodeConfig {
    let mut config = NodeConfig::from_args(
        "ESP32_1".into(),
        Point2::new(9.0, 9.0),
        ([127, 0, 0, 1], 0).into(),
        collector_url,
        unreachable_url(),
    );
    config.interval_ms = 25;
    config.delivery_timeout_ms = 500;
    config
}

#[tokio::test]
async fn node_reports_periodically_while_relaying_for_peers() {
    let (collector_url, received) = spawn_recording_collector();
    let handle = start_node(&node_config(collector_url), CountingSource(AtomicU64::new(0))).unwrap();

    let relay_url = format!("http://{}/data", handle.relay_addr);
    let resp = reqwest::Client::new()
        .post(&relay_url)
        .json(&DetectionPayload::new("ESP32_2", 0.5))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown();

    let received = received.lock().unwrap().clone();
    let own: Vec<_> = received.iter().filter(|p| p.node_id == "ESP32_1").collect();
    assert!(own.len() >= 2, "expected periodic reports, got {}", own.len());
    assert!(own.iter().all(|p| !p.routed));
    assert!(received
        .iter()
        .any(|p| p.node_id == "ESP32_2" && p.routed && p.timestamp == 0.5));
}

#[tokio::test]
async fn slow_collector_does_not_stall_ticks_or_relay() {
    let (collector_url, received, answered) = spawn_slow_collector(Duration::from_millis(1500));
    let mut config = node_config(collector_url);
    config.interval_ms = 50;
    config.delivery_timeout_ms = 5_000;
    let handle = start_node(&config, CountingSource(AtomicU64::new(0))).unwrap();
    let relay_url = format!("http://{}/data", handle.relay_addr);
    let http = reqwest::Client::new();

    // A second hop is refused without touching the collector.
    let started = Instant::now();
    let refused = http
        .post(&relay_url)
        .json(&DetectionPayload::new("ESP32_2", 0.25).relayed())
        .send()
        .await
        .unwrap();
    assert_eq!(refused.status(), 400);
    assert!(started.elapsed() < Duration::from_millis(1000));

    // A forward is accepted while the node's own deliveries are pending.
    let forward = tokio::spawn({
        let http = http.clone();
        let relay_url = relay_url.clone();
        async move {
            http.post(&relay_url)
                .json(&DetectionPayload::new("ESP32_2", 0.5))
                .send()
                .await
                .map(|resp| resp.status().as_u16())
        }
    });

    tokio::time::sleep(Duration::from_millis(600)).await;
    let arrived = received.lock().unwrap().clone();
    assert_eq!(answered.load(Ordering::SeqCst), 0, "collector answered too early");
    let own = arrived.iter().filter(|p| p.node_id == "ESP32_1").count();
    assert!(own >= 2, "ticks stalled behind a slow delivery: {}", own);
    assert!(arrived.iter().any(|p| p.node_id == "ESP32_2" && p.routed));

    assert_eq!(forward.await.unwrap().unwrap(), 200);
    handle.shutdown();
}

#[tokio::test]
async fn invalid_config_does_not_start() {
    let (collector_url, _received) = spawn_recording_collector();
    let mut config = node_config(collector_url);
    config.interval_ms = 0;
    assert!(start_node(&config, CountingSource(AtomicU64::new(0))).is_err());
}
