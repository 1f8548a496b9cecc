//! Metrics definitions for the room service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `room_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max
//! - `endpoint`: parameterized paths only (room ids are collapsed)
//! - `status`: success, error, timeout / joined, not_found
//! - `kind`: offer, answer, ice-candidate, call-request, call-response

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("room_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `room_http_requests_total`, `room_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("room_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("room_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        100..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/ws" | "/api/register" | "/api/login" | "/api/rooms" => {
            path.to_string()
        }
        _ => {
            // /api/rooms/{room_id}
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() == 4 && path.starts_with("/api/rooms/") {
                return "/api/rooms/{room_id}".to_string();
            }
            "/other".to_string()
        }
    }
}

// ============================================================================
// Registry Metrics
// ============================================================================

/// Metric: `room_rooms_created_total`
pub fn record_room_created() {
    counter!("room_rooms_created_total").increment(1);
}

/// Record a join attempt.
///
/// Metric: `room_joins_total`
/// Labels: `status` (joined, not_found)
pub fn record_join(status: &str) {
    counter!("room_joins_total", "status" => status.to_string()).increment(1);
}

/// Metric: `room_messages_relayed_total`
pub fn record_message_relayed() {
    counter!("room_messages_relayed_total").increment(1);
}

/// Record rooms deleted because nobody joined them in time.
///
/// Metric: `room_pending_rooms_swept_total`
pub fn record_pending_rooms_swept(count: usize) {
    counter!("room_pending_rooms_swept_total").increment(count as u64);
}

/// Update the active room gauge.
///
/// Metric: `room_rooms_active`
pub fn set_rooms_active(count: usize) {
    gauge!("room_rooms_active").set(count as f64);
}

// ============================================================================
// Signaling Metrics
// ============================================================================

/// Record a signaling event delivered to its target.
///
/// Metric: `room_signaling_forwarded_total`
/// Labels: `kind`
pub fn record_signaling_forwarded(kind: &str) {
    counter!("room_signaling_forwarded_total", "kind" => kind.to_string()).increment(1);
}

/// Record a signaling event dropped because its target was unreachable.
///
/// Metric: `room_signaling_dropped_total`
/// Labels: `kind`
pub fn record_signaling_dropped(kind: &str) {
    counter!("room_signaling_dropped_total", "kind" => kind.to_string()).increment(1);
}

// ============================================================================
// Connection Metrics
// ============================================================================

/// Metric: `room_connections_active` (incremented on accept)
pub fn record_connection_opened() {
    gauge!("room_connections_active").increment(1.0);
}

/// Metric: `room_connections_active` (decremented on close)
pub fn record_connection_closed() {
    gauge!("room_connections_active").decrement(1.0);
}

/// Record a connection evicted because its outbound queue was full.
///
/// Metric: `room_connections_evicted_total`
pub fn record_connection_evicted() {
    counter!("room_connections_evicted_total").increment(1);
}
