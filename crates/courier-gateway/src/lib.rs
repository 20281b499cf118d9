// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook HTTP gateway.
//!
//! Serves every connector endpoint on its configured path, acknowledges
//! callbacks immediately, and hands verified bodies to a bounded worker pool.

pub mod handlers;
pub mod server;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use courier_core::{AdapterType, CourierError, HealthStatus, PluginAdapter};

pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};

/// The gateway as a managed adapter: a background axum server.
pub struct Gateway {
    config: ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("paths", &self.state.endpoints.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Gateway {
    pub fn new(config: ServerConfig, state: GatewayState, cancel: CancellationToken) -> Self {
        Self {
            config,
            state,
            cancel,
            server_handle: Mutex::new(None),
        }
    }

    /// Spawns the server task. Calling it twice has no effect.
    pub async fn start(&self) {
        let mut handle = self.server_handle.lock().await;
        if handle.is_some() {
            return;
        }
        let config = self.config.clone();
        let state = self.state.clone();
        let cancel = self.cancel.clone();
        *handle = Some(tokio::spawn(async move {
            if let Err(e) = start_server(&config, state, cancel.clone()).await {
                tracing::error!(error = %e, "gateway server error");
                cancel.cancel();
            }
        }));
    }

    /// Waits for the server task to finish.
    pub async fn join(&self) {
        let handle = self.server_handle.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "gateway task panicked");
        }
    }
}

#[async_trait]
impl PluginAdapter for Gateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let handle = self.server_handle.lock().await;
        match handle.as_ref() {
            Some(h) if !h.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server stopped".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.cancel.cancel();
        self.join().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> Gateway {
        let state = GatewayState::new(
            Vec::new(),
            4,
            HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: None,
                adapters: Vec::new(),
            },
        );
        Gateway::new(
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            state,
            CancellationToken::new(),
        )
    }

    #[test]
    fn gateway_identity() {
        let gateway = gateway();
        assert_eq!(gateway.name(), "gateway");
        assert_eq!(gateway.adapter_type(), AdapterType::Gateway);
        assert_eq!(gateway.version(), semver::Version::new(0, 1, 0));
    }

    #[tokio::test]
    async fn health_before_start() {
        let gateway = gateway();
        match gateway.health_check().await.unwrap() {
            HealthStatus::Unhealthy(msg) => assert!(msg.contains("not started")),
            other => panic!("expected Unhealthy before start, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_then_shutdown() {
        let gateway = gateway();
        gateway.start().await;
        assert_eq!(gateway.health_check().await.unwrap(), HealthStatus::Healthy);
        gateway.shutdown().await.unwrap();
        match gateway.health_check().await.unwrap() {
            HealthStatus::Unhealthy(_) => {}
            other => panic!("expected Unhealthy after shutdown, got {other:?}"),
        }
    }
}
