// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Registers every configured connector, starts the webhook gateway and the
//! background maintenance tasks, and runs until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use courier_config::model::CourierConfig;
use courier_core::{ConnectorController, ConnectorRegistry, CourierError, PluginAdapter, WebhookEndpoint};
use courier_gateway::{Gateway, GatewayState, HealthState, ServerConfig};
use courier_messenger::MessengerSetup;
use courier_prometheus::PrometheusAdapter;
use courier_whatsapp::WhatsAppSetup;

use crate::controller::LogController;
use crate::shutdown;

/// How often expired hashed user ids are dropped.
const HASH_PURGE_PERIOD: Duration = Duration::from_secs(60);
/// Time given to background tasks to stop after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type RenderFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Everything `serve` runs, built from the configuration.
pub struct Services {
    pub registry: Arc<ConnectorRegistry>,
    pub messenger: MessengerSetup,
    pub whatsapp: WhatsAppSetup,
    pub gateway_state: GatewayState,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("connectors", &self.registry.connector_ids())
            .field("messenger", &self.messenger)
            .field("whatsapp", &self.whatsapp)
            .finish()
    }
}

impl Services {
    /// Every connector, as a health-checked adapter.
    pub fn adapters(&self) -> Vec<Arc<dyn PluginAdapter>> {
        let messenger = self
            .messenger
            .connectors
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn PluginAdapter>);
        let whatsapp = self
            .whatsapp
            .connectors
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn PluginAdapter>);
        messenger.chain(whatsapp).collect()
    }
}

/// Registers all connectors against `controller` and prepares the gateway state.
pub fn build_services(
    config: &CourierConfig,
    controller: Arc<dyn ConnectorController>,
    prometheus_render: Option<RenderFn>,
) -> Result<Services, CourierError> {
    let registry = Arc::new(ConnectorRegistry::new());
    let messenger = courier_messenger::build(
        &config.messenger,
        &config.delivery,
        Arc::clone(&registry),
        Arc::clone(&controller),
    )?;
    let whatsapp = courier_whatsapp::build(
        &config.whatsapp,
        &config.delivery,
        Arc::clone(&registry),
        controller,
    )?;

    let endpoints: Vec<Arc<dyn WebhookEndpoint>> = messenger
        .endpoints
        .iter()
        .map(|e| Arc::clone(e) as Arc<dyn WebhookEndpoint>)
        .chain(
            whatsapp
                .endpoints
                .iter()
                .map(|e| Arc::clone(e) as Arc<dyn WebhookEndpoint>),
        )
        .collect();

    let mut services = Services {
        registry,
        messenger,
        whatsapp,
        gateway_state: GatewayState::new(
            endpoints,
            config.service.worker_pool_size,
            HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
                adapters: Vec::new(),
            },
        ),
    };
    services.gateway_state.health.adapters = services.adapters();
    Ok(services)
}

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting courier serve");

    let cancel = shutdown::install_signal_handler();

    let prometheus = if config.prometheus.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => Some(Arc::new(adapter)),
            Err(e) => {
                warn!(error = %e, "prometheus disabled");
                None
            }
        }
    } else {
        None
    };
    let render = prometheus.as_ref().map(|adapter| {
        let adapter = Arc::clone(adapter);
        Arc::new(move || adapter.render()) as RenderFn
    });

    let mut services = build_services(&config, Arc::new(LogController), render)?;
    if services.registry.is_empty() {
        warn!("no connector configured, only health and metrics are served");
    }

    let tasks = spawn_background_tasks(&config, &mut services, &cancel);

    let gateway = Gateway::new(
        ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        },
        services.gateway_state.clone(),
        cancel.clone(),
    );
    gateway.start().await;
    info!(
        connectors = services.registry.len(),
        host = %config.gateway.host,
        port = config.gateway.port,
        "courier ready"
    );

    cancel.cancelled().await;
    info!("shutting down");

    gateway.join().await;
    for adapter in services.adapters() {
        if let Err(e) = adapter.shutdown().await {
            warn!(adapter = %adapter.name(), error = %e, "adapter shutdown failed");
        }
    }
    shutdown::drain_tasks(tasks, DRAIN_TIMEOUT).await;

    info!("courier stopped");
    Ok(())
}

fn spawn_background_tasks(
    config: &CourierConfig,
    services: &mut Services,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();
    if let Some(checker) = services.messenger.subscription_checker.take() {
        let period = Duration::from_secs(config.messenger.webhook_check_period_secs);
        info!(period_secs = period.as_secs(), "webhook subscription check enabled");
        tasks.push(checker.spawn(period, cancel.child_token()));
    }
    if let Some(hash_cache) = &services.whatsapp.hash_cache {
        tasks.push(Arc::clone(hash_cache).spawn_purge(HASH_PURGE_PERIOD, cancel.child_token()));
    }
    tasks
}

/// Initializes the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
