use crate::collector::model::CollectorStatus;
use crate::reply::{error_reply, json_reply, MAX_BODY_BYTES};
use log::{info, warn};
use serde_json::json;
use std::sync::Arc;
use tdoacore::correlation::{DetectionAggregator, EstimateSink, RecordOutcome};
use tdoacore::{CorrelationError, DetectionPayload};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Reply};

/// `POST /data` feeds the aggregator; `GET /status` reports its counters.
pub fn collector_routes<S>(
    aggregator: Arc<DetectionAggregator<S>>,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone + Send + Sync + 'static
where
    S: EstimateSink + 'static,
{
    let aggregator_filter = warp::any().map(move || aggregator.clone());

    let ingest = warp::path("data")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(aggregator_filter.clone())
        .map(handle_ingest);

    let status = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(aggregator_filter)
        .map(|aggregator: Arc<DetectionAggregator<S>>| {
            let metrics = aggregator.metrics().snapshot();
            let status = CollectorStatus::new(aggregator.open_windows(), &metrics);
            warp::reply::json(&status).into_response()
        });

    ingest.or(status).unify()
}

fn handle_ingest<S: EstimateSink>(
    body: Bytes,
    aggregator: Arc<DetectionAggregator<S>>,
) -> Response {
    let payload: DetectionPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("collector: rejecting malformed payload: {}", err);
            return error_reply(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    info!(
        "collector: detection from {} at {:.6} (routed={})",
        payload.node_id, payload.timestamp, payload.routed
    );

    match aggregator.record_detection(&payload.node_id, payload.timestamp) {
        Ok(outcome) => {
            let window = match &outcome {
                RecordOutcome::Opened { window } | RecordOutcome::Accepted { window, .. } => *window,
                RecordOutcome::Closed(report) => report.window(),
            };
            json_reply(
                &json!({"status": "success", "correlation": outcome.label(), "window": window}),
                StatusCode::OK,
            )
        }
        // The detection arrived; it just carries no new information.
        Err(CorrelationError::DuplicateNode { window, .. }) => json_reply(
            &json!({"status": "success", "correlation": "duplicate_node", "window": window}),
            StatusCode::OK,
        ),
        Err(CorrelationError::StaleReport { window, .. }) => json_reply(
            &json!({"status": "success", "correlation": "stale_report", "window": window}),
            StatusCode::OK,
        ),
        Err(err @ CorrelationError::UnknownNode(_)) => {
            warn!("collector: {}", err);
            error_reply(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
        }
    }
}
