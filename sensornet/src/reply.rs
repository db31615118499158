use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Detection bodies are a few dozen bytes; anything past this is refused.
pub const MAX_BODY_BYTES: u64 = 4 * 1024;

pub fn json_reply(body: &Value, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

pub fn success_reply(status: StatusCode) -> Response {
    json_reply(&json!({"status": "success"}), status)
}

pub fn error_reply(status: StatusCode, message: &str) -> Response {
    json_reply(&json!({"status": "error", "message": message}), status)
}
