// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of a WhatsApp Cloud connector.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use courier_core::{
    Action, ActionKind, AdapterType, AttachmentCache, AttachmentSource, Connector,
    ConnectorRegistry, ConnectorType, CourierError, DeliveryQueue, Event, EventKind,
    HealthStatus, NotificationType, PluginAdapter, Transmitter, UserProfile,
};

use crate::client::WhatsAppClient;
use crate::hash_cache::ThreadHashCache;
use crate::translator::to_message;
use crate::types::SendRequest;

/// Profile names of senders, keyed by the id shown to the bot.
pub type ContactNames = Arc<DashMap<String, String>>;

/// A connector bound to one business phone number.
pub struct WhatsAppConnector {
    connector_id: String,
    phone_number_id: String,
    client: Arc<WhatsAppClient>,
    registry: Arc<ConnectorRegistry>,
    contacts: ContactNames,
    queue: DeliveryQueue<Action>,
}

impl std::fmt::Debug for WhatsAppConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConnector")
            .field("connector_id", &self.connector_id)
            .field("phone_number_id", &self.phone_number_id)
            .field("lanes", &self.queue.lane_count())
            .finish()
    }
}

impl WhatsAppConnector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connector_id: impl Into<String>,
        phone_number_id: impl Into<String>,
        client: Arc<WhatsAppClient>,
        cache: Arc<AttachmentCache>,
        registry: Arc<ConnectorRegistry>,
        hash_cache: Option<Arc<ThreadHashCache>>,
        contacts: ContactNames,
        lane_idle_timeout: Duration,
    ) -> Self {
        let connector_id = connector_id.into();
        let phone_number_id = phone_number_id.into();
        let transmitter = Arc::new(WhatsAppTransmitter {
            connector_id: connector_id.clone(),
            phone_number_id: phone_number_id.clone(),
            client: Arc::clone(&client),
            cache,
            registry: Arc::clone(&registry),
            hash_cache,
        });
        Self {
            connector_id,
            phone_number_id,
            client,
            registry,
            contacts,
            queue: DeliveryQueue::new(transmitter, lane_idle_timeout),
        }
    }

    pub fn phone_number_id(&self) -> &str {
        &self.phone_number_id
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppConnector {
    fn name(&self) -> &str {
        &self.connector_id
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Connector
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let token = self.registry.token_for(&self.connector_id)?;
        if self
            .client
            .phone_number_reachable(&self.phone_number_id, &token)
            .await
        {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(format!(
                "phone number {} unreachable",
                self.phone_number_id
            )))
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        debug!(connector_id = %self.connector_id, "whatsapp connector shutting down");
        self.registry.unregister(&self.connector_id);
        Ok(())
    }
}

#[async_trait]
impl Connector for WhatsAppConnector {
    fn connector_id(&self) -> &str {
        &self.connector_id
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::WhatsappCloud
    }

    fn send(&self, action: Action, delay: Duration) {
        let key = action.recipient_id.clone();
        self.queue.submit(&key, action, delay);
    }

    async fn notify(
        &self,
        recipient_id: &str,
        intent: &str,
        parameters: BTreeMap<String, String>,
        notification_type: Option<NotificationType>,
    ) -> Result<(), CourierError> {
        let controller = self.registry.controller_for(&self.connector_id)?;
        info!(
            connector_id = %self.connector_id,
            recipient_id,
            intent,
            notification_type = ?notification_type,
            "proactive notification"
        );
        let event = Event::new(
            recipient_id,
            self.phone_number_id.clone(),
            self.connector_id.clone(),
            EventKind::Choice {
                intent: intent.to_string(),
                parameters,
            },
        );
        controller.handle(event).await
    }

    /// Only the profile name sent along with the user's messages is known.
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, CourierError> {
        Ok(self.contacts.get(user_id).map(|name| UserProfile {
            first_name: Some(name.clone()),
            ..UserProfile::default()
        }))
    }
}

struct WhatsAppTransmitter {
    connector_id: String,
    phone_number_id: String,
    client: Arc<WhatsAppClient>,
    cache: Arc<AttachmentCache>,
    registry: Arc<ConnectorRegistry>,
    hash_cache: Option<Arc<ThreadHashCache>>,
}

#[async_trait]
impl Transmitter<Action> for WhatsAppTransmitter {
    async fn transmit(&self, _key: &str, action: Action) -> Result<(), CourierError> {
        let result = self.deliver(&action).await;
        if let Err(e) = &result {
            error!(
                connector_id = %self.connector_id,
                recipient_id = %action.recipient_id,
                action = action.kind_name(),
                error = %e,
                "whatsapp delivery failed"
            );
            match self.registry.controller_for(&action.application_id) {
                Ok(controller) => controller.on_error(&action, e),
                Err(lookup) => warn!(error = %lookup, "no controller to report delivery failure"),
            }
        }
        result
    }
}

impl WhatsAppTransmitter {
    async fn deliver(&self, action: &Action) -> Result<(), CourierError> {
        let token = self.registry.token_for(&action.application_id)?;
        let to = self.recipient(&action.recipient_id)?;
        let mut message = to_message(action);

        let media_id = match &action.kind {
            ActionKind::Attachment {
                source: AttachmentSource::Url(url),
                ..
            } => Some(self.upload_url(&token, url).await?),
            ActionKind::Attachment {
                source:
                    AttachmentSource::Binary {
                        bytes,
                        mime_type,
                        file_name,
                    },
                ..
            } => Some(
                self.client
                    .upload_media(
                        &self.phone_number_id,
                        &token,
                        bytes.clone(),
                        mime_type,
                        file_name,
                    )
                    .await?,
            ),
            _ => None,
        };
        if let (Some(id), Some(media)) = (media_id, message.media_mut()) {
            media.id = Some(id);
        }

        let response = self
            .client
            .send_message(&self.phone_number_id, &token, &SendRequest::new(to, message))
            .await?;
        debug!(
            connector_id = %self.connector_id,
            message_id = ?response.message_id(),
            "whatsapp message sent"
        );
        Ok(())
    }

    /// Real number of `id`. With hashing on, raw numbers are still accepted
    /// for recipients the bot never heard from (proactive messages).
    fn recipient(&self, id: &str) -> Result<String, CourierError> {
        let Some(hash_cache) = &self.hash_cache else {
            return Ok(id.to_string());
        };
        match hash_cache.resolve(id) {
            Err(CourierError::NotFound { .. }) if is_phone_number(id) => Ok(id.to_string()),
            resolved => resolved,
        }
    }

    /// Media id of `url` for this number, downloading and uploading on a miss.
    async fn upload_url(&self, token: &str, url: &str) -> Result<String, CourierError> {
        self.cache
            .get_or_upload(&self.phone_number_id, url, || async {
                let media = self.client.download(url).await?;
                self.client
                    .upload_media(
                        &self.phone_number_id,
                        token,
                        media.bytes,
                        &media.mime_type,
                        file_name(url),
                    )
                    .await
            })
            .await
    }
}

fn is_phone_number(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

fn file_name(url: &str) -> &str {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("media")
}
