// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for webhook callbacks, handshakes, health and metrics.

use axum::{
    Json,
    body::Bytes,
    extract::{MatchedPath, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error, warn};

use courier_core::telemetry::record_rejected;
use courier_core::{ChallengeQuery, CourierError, HealthStatus, INVALID_VERIFY_TOKEN};

use crate::server::GatewayState;

/// POST on a webhook path.
///
/// Always answers 200 so the platform never retries: a bad signature is
/// logged and dropped, a good body is processed off the request path.
pub async fn post_callback(
    State(state): State<GatewayState>,
    matched: MatchedPath,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(endpoint) = state.endpoints.get(matched.as_str()).cloned() else {
        return StatusCode::NOT_FOUND;
    };

    let header_name = endpoint.signature_algorithm().header_name();
    let signature = headers.get(header_name).and_then(|v| v.to_str().ok());
    if !endpoint.verify_signature(signature, &body) {
        warn!(
            path = %matched.as_str(),
            header = header_name,
            body = %String::from_utf8_lossy(&body),
            "webhook signature mismatch, callback dropped"
        );
        record_rejected("signature");
        return StatusCode::OK;
    }

    let workers = state.workers.clone();
    tokio::spawn(async move {
        let Ok(_permit) = workers.acquire_owned().await else {
            return;
        };
        match endpoint.process(&body).await {
            Ok(handled) => debug!(path = %endpoint.path(), handled, "callback processed"),
            Err(e) => {
                let reason = rejection_reason(&e);
                if reason == "config" {
                    error!(path = %endpoint.path(), error = %e, "callback rejected");
                } else {
                    warn!(path = %endpoint.path(), error = %e, "callback rejected");
                }
                record_rejected(reason);
            }
        }
    });
    StatusCode::OK
}

/// Metric label of a callback whose processing failed.
///
/// An unknown connector or credential is a configuration problem, not a bad
/// payload.
fn rejection_reason(error: &CourierError) -> &'static str {
    match error {
        CourierError::Decode { .. } => "decode",
        CourierError::NotFound { .. } | CourierError::Config(_) => "config",
        _ => "internal",
    }
}

/// GET on a webhook path: the subscription handshake.
///
/// Rejections are answered with 200 and a fixed body, like acceptance.
pub async fn get_challenge(
    State(state): State<GatewayState>,
    matched: MatchedPath,
    Query(query): Query<ChallengeQuery>,
) -> Response {
    let Some(endpoint) = state.endpoints.get(matched.as_str()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match endpoint.verify_challenge(&query) {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => (StatusCode::OK, INVALID_VERIFY_TOKEN).into_response(),
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, `degraded` or `unhealthy`: the worst adapter status.
    pub status: String,
    /// Binary version.
    pub version: String,
    pub uptime_secs: u64,
    pub adapters: Vec<AdapterHealth>,
}

#[derive(Debug, Serialize)]
pub struct AdapterHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// GET /health
///
/// Polls every adapter; 503 when one of them is unhealthy.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let mut adapters = Vec::with_capacity(state.health.adapters.len());
    let mut worst = 0u8;
    for adapter in &state.health.adapters {
        let (rank, status, detail) = match adapter.health_check().await {
            Ok(HealthStatus::Healthy) => (0, "ok", None),
            Ok(HealthStatus::Degraded(reason)) => (1, "degraded", Some(reason)),
            Ok(HealthStatus::Unhealthy(reason)) => (2, "unhealthy", Some(reason)),
            Err(e) => (2, "unhealthy", Some(e.to_string())),
        };
        worst = worst.max(rank);
        adapters.push(AdapterHealth {
            name: adapter.name().to_string(),
            status: status.to_string(),
            detail,
        });
    }

    let (code, status) = match worst {
        0 => (StatusCode::OK, "ok"),
        1 => (StatusCode::OK, "degraded"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };
    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        adapters,
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
