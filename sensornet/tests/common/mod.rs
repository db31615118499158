#![allow(dead_code)]

use sensornet::{DeliveryClient, HttpTransport};
use serde_json::json;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tdoacore::DetectionPayload;
use warp::Filter;

pub type Received = Arc<Mutex<Vec<DetectionPayload>>>;

/// Stand-in collector that records every payload it accepts.
pub fn spawn_recording_collector() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let store = received.clone();
    let route = warp::path("data")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |payload: DetectionPayload| {
            store.lock().unwrap().push(payload);
            warp::reply::json(&json!({"status": "success"}))
        });
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (format!("http://{}/data", addr), received)
}

/// Collector that records each payload on arrival, then holds the reply for
/// `delay`. The counter tracks how many replies have been sent.
pub fn spawn_slow_collector(delay: Duration) -> (String, Received, Arc<AtomicUsize>) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let answered = Arc::new(AtomicUsize::new(0));
    let store = received.clone();
    let done = answered.clone();
    let route = warp::path("data")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(move |payload: DetectionPayload| {
            let store = store.clone();
            let done = done.clone();
            async move {
                store.lock().unwrap().push(payload);
                tokio::time::sleep(delay).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, warp::Rejection>(warp::reply::json(&json!({"status": "success"})))
            }
        });
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (format!("http://{}/data", addr), received, answered)
}

/// URL of a port nothing listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/data", addr)
}

pub fn http_client(collector_url: &str, peer_url: &str) -> DeliveryClient<HttpTransport> {
    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
    DeliveryClient::new(transport, collector_url, peer_url)
}
