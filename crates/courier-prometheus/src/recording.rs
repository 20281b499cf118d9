// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions.
//!
//! Recording happens through the helpers in `courier_core::telemetry`; this
//! module only tells the recorder what each series means.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

use courier_core::telemetry::{
    ATTACHMENT_CACHE, DELIVERY_LANES, REQUEST_DURATION, REQUEST_ERRORS, WEBHOOK_EVENTS,
    WEBHOOK_REJECTED,
};

/// Register all Courier metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_histogram!(
        REQUEST_DURATION,
        Unit::Seconds,
        "Platform request duration by request name and outcome"
    );
    describe_counter!(REQUEST_ERRORS, "Failed platform requests by request name");
    describe_counter!(
        WEBHOOK_EVENTS,
        "Events handed to controllers by connector type and kind"
    );
    describe_counter!(WEBHOOK_REJECTED, "Webhook bodies dropped by reason");
    describe_counter!(ATTACHMENT_CACHE, "Attachment cache lookups by result");
    describe_gauge!(DELIVERY_LANES, "Live per-recipient delivery lanes");
}
