// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API connector for the Courier connector layer.
//!
//! Each connector is bound to one business phone number. Inbound senders
//! are hidden behind per-number hashes unless hashing is disabled, and media
//! is uploaded once per number and URL.

pub mod client;
pub mod connector;
pub mod endpoint;
pub mod hash_cache;
pub mod normalizer;
pub mod translator;
pub mod types;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use courier_config::model::{DeliveryConfig, WhatsAppConfig};
use courier_core::{
    AttachmentCache, ConnectorController, ConnectorRegistration, ConnectorRegistry, CourierError,
};

pub use client::WhatsAppClient;
pub use connector::WhatsAppConnector;
pub use endpoint::{EndpointParams, WhatsAppEndpoint};
pub use hash_cache::ThreadHashCache;

/// Everything built from the `[whatsapp]` section.
#[derive(Debug)]
pub struct WhatsAppSetup {
    pub connectors: Vec<Arc<WhatsAppConnector>>,
    pub endpoints: Vec<Arc<WhatsAppEndpoint>>,
    /// Present when sender hashing is enabled; needs a purge task.
    pub hash_cache: Option<Arc<ThreadHashCache>>,
}

/// Registers every configured WhatsApp connector with one endpoint each.
pub fn build(
    config: &WhatsAppConfig,
    delivery: &DeliveryConfig,
    registry: Arc<ConnectorRegistry>,
    controller: Arc<dyn ConnectorController>,
) -> Result<WhatsAppSetup, CourierError> {
    let client = Arc::new(WhatsAppClient::new(config)?);
    build_with_client(config, delivery, registry, controller, client)
}

/// Same as [`build`], with a caller-provided client.
pub fn build_with_client(
    config: &WhatsAppConfig,
    delivery: &DeliveryConfig,
    registry: Arc<ConnectorRegistry>,
    controller: Arc<dyn ConnectorController>,
    client: Arc<WhatsAppClient>,
) -> Result<WhatsAppSetup, CourierError> {
    let cache = Arc::new(AttachmentCache::new(config.attachment_cache_capacity));
    let hash_cache = config
        .hash_user_ids
        .then(|| Arc::new(ThreadHashCache::new(Duration::from_secs(config.hash_ttl_secs))));
    let idle_timeout = Duration::from_secs(delivery.lane_idle_timeout_secs);

    let mut connectors = Vec::with_capacity(config.connectors.len());
    let mut endpoints = Vec::with_capacity(config.connectors.len());

    for entry in &config.connectors {
        registry.register(ConnectorRegistration {
            connector_id: entry.connector_id.clone(),
            application_id: entry.application_id.clone(),
            page_id: entry.phone_number_id.clone(),
            token: entry.token.clone(),
            app_token: None,
            controller: Arc::clone(&controller),
        });

        let contacts = Arc::new(DashMap::new());
        connectors.push(Arc::new(WhatsAppConnector::new(
            entry.connector_id.clone(),
            entry.phone_number_id.clone(),
            Arc::clone(&client),
            Arc::clone(&cache),
            Arc::clone(&registry),
            hash_cache.clone(),
            Arc::clone(&contacts),
            idle_timeout,
        )));
        endpoints.push(Arc::new(WhatsAppEndpoint::new(
            EndpointParams {
                path: entry.path.clone(),
                connector_id: entry.connector_id.clone(),
                phone_number_id: entry.phone_number_id.clone(),
                app_secret: entry.app_secret.clone(),
                verify_token: entry.verify_token.clone(),
                mode: entry.mode.clone(),
                restricted_phone_numbers: config.restricted_phone_numbers.clone(),
            },
            Arc::clone(&client),
            Arc::clone(&registry),
            hash_cache.clone(),
            contacts,
        )));

        info!(
            connector_id = %entry.connector_id,
            phone_number_id = %entry.phone_number_id,
            path = %entry.path,
            hashed = config.hash_user_ids,
            "whatsapp connector registered"
        );
    }

    Ok(WhatsAppSetup {
        connectors,
        endpoints,
        hash_cache,
    })
}
