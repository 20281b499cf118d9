// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up one route per webhook path plus the public health and metrics
//! endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use courier_core::{CourierError, PluginAdapter, WebhookEndpoint};

use crate::handlers;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Adapters polled by `/health`.
    pub adapters: Vec<Arc<dyn PluginAdapter>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Webhook endpoints by path.
    pub endpoints: Arc<HashMap<String, Arc<dyn WebhookEndpoint>>>,
    /// Bounds the number of callback bodies processed at once.
    pub workers: Arc<Semaphore>,
    pub health: HealthState,
}

impl GatewayState {
    /// Indexes `endpoints` by path. A path claimed twice keeps its first endpoint.
    pub fn new(
        endpoints: Vec<Arc<dyn WebhookEndpoint>>,
        worker_pool_size: usize,
        health: HealthState,
    ) -> Self {
        let mut by_path: HashMap<String, Arc<dyn WebhookEndpoint>> = HashMap::new();
        for endpoint in endpoints {
            let path = endpoint.path().to_string();
            if by_path.contains_key(&path) {
                warn!(path = %path, "webhook path already served, endpoint ignored");
                continue;
            }
            by_path.insert(path, endpoint);
        }
        Self {
            endpoints: Arc::new(by_path),
            workers: Arc::new(Semaphore::new(worker_pool_size.max(1))),
            health,
        }
    }
}

/// Gateway server configuration (mirrors GatewayConfig from courier-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Builds the router:
/// - GET /health, GET /metrics
/// - GET (handshake) and POST (callbacks) on every webhook path
pub fn router(state: GatewayState) -> Router {
    let mut webhooks = Router::new();
    for path in state.endpoints.keys() {
        webhooks = webhooks.route(
            path,
            get(handlers::get_challenge).post(handlers::post_callback),
        );
    }

    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .merge(webhooks)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP server and serve until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), CourierError> {
    let paths: Vec<String> = state.endpoints.keys().cloned().collect();
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Connector {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!(addr = %addr, paths = ?paths, "gateway server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| CourierError::Connector {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }

    #[test]
    fn zero_workers_still_processes() {
        let state = GatewayState::new(
            Vec::new(),
            0,
            HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: None,
                adapters: Vec::new(),
            },
        );
        assert_eq!(state.workers.available_permits(), 1);
        let _cloned = state.clone();
    }
}
