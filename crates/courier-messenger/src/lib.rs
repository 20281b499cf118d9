// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger connector for the Courier connector layer.
//!
//! Receives signed page callbacks, normalizes them into [`courier_core::Event`]s,
//! and delivers [`courier_core::Action`]s through the Send API with per-user
//! ordering, transient-error retries, and attachment id reuse.

pub mod client;
pub mod connector;
pub mod endpoint;
pub mod handover;
pub mod normalizer;
pub mod policy;
pub mod subscription;
pub mod translator;
pub mod types;
pub mod webhook;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use courier_config::model::{DeliveryConfig, MessengerConfig};
use courier_core::{
    AttachmentCache, ConnectorController, ConnectorRegistration, ConnectorRegistry, CourierError,
};

pub use client::MessengerClient;
pub use connector::MessengerConnector;
pub use endpoint::MessengerEndpoint;
pub use handover::HandoverController;
pub use subscription::{SubscriptionChecker, SubscriptionTarget};

/// Everything built from the `[messenger]` section.
#[derive(Debug)]
pub struct MessengerSetup {
    pub connectors: Vec<Arc<MessengerConnector>>,
    pub endpoints: Vec<Arc<MessengerEndpoint>>,
    /// Present when the subscription check is enabled.
    pub subscription_checker: Option<SubscriptionChecker>,
}

/// Registers every configured Messenger connector and builds one endpoint per path.
///
/// All connectors share one client and one attachment cache. The first
/// connector declared on a path provides the endpoint's application, secret,
/// and verify token.
pub fn build(
    config: &MessengerConfig,
    delivery: &DeliveryConfig,
    registry: Arc<ConnectorRegistry>,
    controller: Arc<dyn ConnectorController>,
) -> Result<MessengerSetup, CourierError> {
    let client = Arc::new(MessengerClient::new(config)?);
    build_with_client(config, delivery, registry, controller, client)
}

/// Same as [`build`], with a caller-provided client.
pub fn build_with_client(
    config: &MessengerConfig,
    delivery: &DeliveryConfig,
    registry: Arc<ConnectorRegistry>,
    controller: Arc<dyn ConnectorController>,
    client: Arc<MessengerClient>,
) -> Result<MessengerSetup, CourierError> {
    let cache = Arc::new(AttachmentCache::new(config.attachment_cache_capacity));
    let idle_timeout = Duration::from_secs(delivery.lane_idle_timeout_secs);

    let mut connectors = Vec::with_capacity(config.connectors.len());
    let mut endpoints: BTreeMap<String, MessengerEndpoint> = BTreeMap::new();
    let mut targets = Vec::new();

    for entry in &config.connectors {
        registry.register(ConnectorRegistration {
            connector_id: entry.connector_id.clone(),
            application_id: entry.application_id.clone(),
            page_id: entry.page_id.clone(),
            token: entry.token.clone(),
            app_token: entry.app_token.clone(),
            controller: Arc::clone(&controller),
        });

        let handover = Arc::new(HandoverController::new(
            Arc::clone(&client),
            entry.token.clone(),
            entry.application_id.clone(),
        ));
        connectors.push(Arc::new(MessengerConnector::new(
            entry.connector_id.clone(),
            entry.application_id.clone(),
            entry.page_id.clone(),
            Arc::clone(&client),
            Arc::clone(&cache),
            Arc::clone(&registry),
            Arc::clone(&handover),
            idle_timeout,
        )));

        let endpoint = endpoints.remove(&entry.path).unwrap_or_else(|| {
            MessengerEndpoint::new(
                entry.path.clone(),
                entry.application_id.clone(),
                entry.connector_id.clone(),
                entry.secret.clone(),
                entry.verify_token.clone(),
                Arc::clone(&registry),
            )
        });
        endpoints.insert(
            entry.path.clone(),
            endpoint.with_handover(entry.connector_id.clone(), handover),
        );

        match &entry.app_token {
            Some(app_token) => targets.push(SubscriptionTarget {
                connector_id: entry.connector_id.clone(),
                application_id: entry.application_id.clone(),
                page_id: entry.page_id.clone(),
                token: entry.token.clone(),
                app_token: app_token.clone(),
                verify_token: entry.verify_token.clone(),
            }),
            None => debug!(
                connector_id = %entry.connector_id,
                "no app token, webhook subscription not checked"
            ),
        }

        info!(
            connector_id = %entry.connector_id,
            page_id = %entry.page_id,
            path = %entry.path,
            "messenger connector registered"
        );
    }

    let subscription_checker = (config.webhook_check_enabled && !targets.is_empty()).then(|| {
        SubscriptionChecker::new(Arc::clone(&client), targets, config.webhook_url.clone())
    });

    Ok(MessengerSetup {
        connectors,
        endpoints: endpoints.into_values().map(Arc::new).collect(),
        subscription_checker,
    })
}
