//! 进程计数器快照。
//!
//! - GET /metrics

use axum::response::Response;
use hub_server::ok;
use hub_telemetry::metrics;

pub async fn get_metrics() -> Response {
    ok(metrics().snapshot())
}
