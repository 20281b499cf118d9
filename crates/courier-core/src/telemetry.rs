// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric names and recording helpers.
//!
//! Uses the metrics-rs facade; the recorder is installed by the binary
//! (see `courier-prometheus`). Without a recorder every call is a no-op.

use std::time::Instant;

/// Duration of platform requests and webhook handling, by request name and outcome.
pub const REQUEST_DURATION: &str = "courier_request_duration_seconds";
/// Failed platform requests, by request name.
pub const REQUEST_ERRORS: &str = "courier_request_errors_total";
/// Normalized events handed to controllers, by connector type and kind.
pub const WEBHOOK_EVENTS: &str = "courier_webhook_events_total";
/// Webhook bodies dropped before parsing, by reason.
pub const WEBHOOK_REJECTED: &str = "courier_webhook_rejected_total";
/// Attachment cache lookups, by result.
pub const ATTACHMENT_CACHE: &str = "courier_attachment_cache_total";
/// Delivery lanes currently alive.
pub const DELIVERY_LANES: &str = "courier_delivery_lanes";

/// Scope guard timing one request.
///
/// The duration is recorded when the guard is dropped, so every exit path
/// (success, handled error, early return, `?`) ends the timer.
#[derive(Debug)]
pub struct RequestTimer {
    name: String,
    started: Instant,
    failed: bool,
}

impl RequestTimer {
    /// Starts a timer for the request `name` (for example `messenger_send_message`).
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started: Instant::now(),
            failed: false,
        }
    }

    /// Records a failure; the guard still records the duration on drop.
    pub fn throwable(&mut self, error: &dyn std::fmt::Display) {
        tracing::debug!(request = %self.name, error = %error, "request failed");
        metrics::counter!(REQUEST_ERRORS, "request" => self.name.clone()).increment(1);
        self.failed = true;
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let outcome = if self.failed { "error" } else { "ok" };
        metrics::histogram!(
            REQUEST_DURATION,
            "request" => self.name.clone(),
            "outcome" => outcome
        )
        .record(self.started.elapsed().as_secs_f64());
    }
}

/// Record a normalized event handed to a controller.
pub fn record_event(connector_type: &str, kind: &'static str) {
    metrics::counter!(
        WEBHOOK_EVENTS,
        "connector" => connector_type.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record a webhook body dropped before processing.
pub fn record_rejected(reason: &'static str) {
    metrics::counter!(WEBHOOK_REJECTED, "reason" => reason).increment(1);
}

/// Record an attachment cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!(ATTACHMENT_CACHE, "result" => result).increment(1);
}

/// Set the number of live delivery lanes.
pub fn set_delivery_lanes(count: usize) {
    metrics::gauge!(DELIVERY_LANES).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_without_recorder() {
        let mut timer = RequestTimer::start("messenger_send_message");
        timer.throwable(&"boom");
        assert_eq!(timer.name(), "messenger_send_message");
        drop(timer);
    }
}
