// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound side: one webhook endpoint per configured path.
//!
//! Several connectors of the same application can share a path. Callbacks
//! are routed to the connector of the entry's page; the first connector
//! declared on the path is the default one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::signature::{self, SignatureAlgorithm};
use courier_core::telemetry::record_event;
use courier_core::{
    ChallengeQuery, ConnectorRegistry, ConnectorType, CourierError, Event, WebhookEndpoint,
};

use crate::handover::HandoverController;
use crate::normalizer::to_event;
use crate::webhook::{CallbackRequest, Webhook};

pub struct MessengerEndpoint {
    path: String,
    application_id: String,
    default_connector_id: String,
    secret: String,
    verify_token: Option<String>,
    registry: Arc<ConnectorRegistry>,
    handovers: HashMap<String, Arc<HandoverController>>,
}

impl std::fmt::Debug for MessengerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerEndpoint")
            .field("path", &self.path)
            .field("application_id", &self.application_id)
            .field("default_connector_id", &self.default_connector_id)
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl MessengerEndpoint {
    pub fn new(
        path: impl Into<String>,
        application_id: impl Into<String>,
        default_connector_id: impl Into<String>,
        secret: impl Into<String>,
        verify_token: Option<String>,
        registry: Arc<ConnectorRegistry>,
    ) -> Self {
        Self {
            path: path.into(),
            application_id: application_id.into(),
            default_connector_id: default_connector_id.into(),
            secret: secret.into(),
            verify_token,
            registry,
            handovers: HashMap::new(),
        }
    }

    /// Attaches the handover ledger of a connector served by this path.
    pub fn with_handover(
        mut self,
        connector_id: impl Into<String>,
        handover: Arc<HandoverController>,
    ) -> Self {
        self.handovers.insert(connector_id.into(), handover);
        self
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    async fn dispatch(&self, mut event: Event, standby: bool) -> bool {
        let handover = self.handovers.get(&event.application_id);
        if standby {
            let owner = match handover {
                Some(h) => h.thread_owner(&event.sender_id).await,
                None => None,
            };
            event.mark_notification(owner);
        }
        if let Some(handover) = handover {
            handover.observe(&event);
        }

        let controller = match self.registry.controller_for(&event.application_id) {
            Ok(controller) => controller,
            Err(e) => {
                warn!(error = %e, "event dropped");
                return false;
            }
        };
        record_event("messenger", event.kind_name());
        let kind = event.kind_name();
        let connector_id = event.application_id.clone();
        if let Err(e) = controller.handle(event).await {
            warn!(connector_id = %connector_id, kind, error = %e, "controller failed to handle event");
        }
        true
    }
}

#[async_trait]
impl WebhookEndpoint for MessengerEndpoint {
    fn path(&self) -> &str {
        &self.path
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Messenger
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Sha1
    }

    fn verify_signature(&self, header: Option<&str>, body: &[u8]) -> bool {
        header.is_some_and(|h| signature::verify(SignatureAlgorithm::Sha1, &self.secret, body, h))
    }

    fn verify_challenge(&self, query: &ChallengeQuery) -> Option<String> {
        let accepted = match &self.verify_token {
            None => true,
            Some(expected) => query.verify_token.as_deref() == Some(expected.as_str()),
        };
        if accepted {
            query.challenge.clone()
        } else {
            warn!(path = %self.path, "invalid verify token");
            None
        }
    }

    async fn process(&self, body: &[u8]) -> Result<usize, CourierError> {
        let request: CallbackRequest = serde_json::from_slice(body)
            .map_err(|e| CourierError::decode("invalid messenger callback", e))?;

        let mut handled = 0;
        for entry in request.entry {
            let Some(registration) =
                self.registry
                    .route(&entry.id, &self.application_id, &self.default_connector_id)
            else {
                warn!(page_id = %entry.id, path = %self.path, "no connector for entry, skipped");
                continue;
            };

            let channels = [(entry.messaging, false), (entry.standby, true)];
            for (values, standby) in channels {
                for value in values.into_iter().flatten() {
                    let webhook = match Webhook::from_value(value) {
                        Ok(webhook) => webhook,
                        Err(e) => {
                            warn!(page_id = %entry.id, error = %e, "sub-event skipped");
                            continue;
                        }
                    };
                    let Some(event) = to_event(&webhook, &registration.connector_id) else {
                        continue;
                    };
                    if self.dispatch(event, standby).await {
                        handled += 1;
                    }
                }
            }
        }
        debug!(path = %self.path, handled, "messenger callback processed");
        Ok(handled)
    }
}
