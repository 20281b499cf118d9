// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of a Messenger connector.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use courier_core::{
    Action, ActionKind, AdapterType, AttachmentCache, AttachmentSource, Connector,
    ConnectorRegistry, ConnectorType, CourierError, DeliveryQueue, Event, EventKind,
    HealthStatus, NotificationType, PluginAdapter, Transmitter, UserProfile,
};

use crate::client::MessengerClient;
use crate::handover::HandoverController;
use crate::translator::to_message_request;
use crate::types::{
    ActionRequest, AttachmentPayload, AttachmentRequest, CustomEventRequest, MessageRequest,
    OutAttachmentType, Recipient, SendResponse, SenderAction,
};

/// A Messenger connector bound to one page of one application.
pub struct MessengerConnector {
    connector_id: String,
    application_id: String,
    page_id: String,
    client: Arc<MessengerClient>,
    registry: Arc<ConnectorRegistry>,
    handover: Arc<HandoverController>,
    queue: DeliveryQueue<Action>,
}

impl std::fmt::Debug for MessengerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerConnector")
            .field("connector_id", &self.connector_id)
            .field("application_id", &self.application_id)
            .field("page_id", &self.page_id)
            .field("lanes", &self.queue.lane_count())
            .finish()
    }
}

impl MessengerConnector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connector_id: impl Into<String>,
        application_id: impl Into<String>,
        page_id: impl Into<String>,
        client: Arc<MessengerClient>,
        cache: Arc<AttachmentCache>,
        registry: Arc<ConnectorRegistry>,
        handover: Arc<HandoverController>,
        lane_idle_timeout: Duration,
    ) -> Self {
        let connector_id = connector_id.into();
        let application_id = application_id.into();
        let transmitter = Arc::new(MessengerTransmitter {
            connector_id: connector_id.clone(),
            application_id: application_id.clone(),
            client: Arc::clone(&client),
            cache,
            registry: Arc::clone(&registry),
        });
        Self {
            connector_id,
            application_id,
            page_id: page_id.into(),
            client,
            registry,
            handover,
            queue: DeliveryQueue::new(transmitter, lane_idle_timeout),
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn handover(&self) -> &Arc<HandoverController> {
        &self.handover
    }

    /// Logs app events for `user_id`. Errors are returned to the caller.
    pub async fn send_custom_event(
        &self,
        user_id: &str,
        events: &[serde_json::Value],
    ) -> Result<SendResponse, CourierError> {
        let request = CustomEventRequest::new(&self.page_id, user_id, events);
        self.client
            .send_custom_event(&self.application_id, &request)
            .await
    }
}

#[async_trait]
impl PluginAdapter for MessengerConnector {
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
        if self.client.health_check().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(
                "messenger platform status unavailable".into(),
            ))
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        debug!(connector_id = %self.connector_id, "messenger connector shutting down");
        self.registry.unregister(&self.connector_id);
        Ok(())
    }
}

#[async_trait]
impl Connector for MessengerConnector {
    fn connector_id(&self) -> &str {
        &self.connector_id
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Messenger
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
            self.page_id.clone(),
            self.connector_id.clone(),
            EventKind::Choice {
                intent: intent.to_string(),
                parameters,
            },
        );
        controller.handle(event).await
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, CourierError> {
        let token = self.registry.token_for(&self.connector_id)?;
        Ok(Some(self.client.user_profile(&token, user_id).await))
    }
}

/// Sends dequeued actions for one connector.
struct MessengerTransmitter {
    connector_id: String,
    application_id: String,
    client: Arc<MessengerClient>,
    cache: Arc<AttachmentCache>,
    registry: Arc<ConnectorRegistry>,
}

#[async_trait]
impl Transmitter<Action> for MessengerTransmitter {
    async fn transmit(&self, _key: &str, action: Action) -> Result<(), CourierError> {
        let result = self.deliver(&action).await;
        if let Err(e) = &result {
            error!(
                connector_id = %self.connector_id,
                recipient_id = %action.recipient_id,
                action = action.kind_name(),
                error = %e,
                "messenger delivery failed"
            );
            match self.registry.controller_for(&action.application_id) {
                Ok(controller) => controller.on_error(&action, e),
                Err(lookup) => warn!(error = %lookup, "no controller to report delivery failure"),
            }
        }
        result
    }
}

impl MessengerTransmitter {
    async fn deliver(&self, action: &Action) -> Result<(), CourierError> {
        let token = self.registry.token_for(&action.application_id)?;
        let Some(mut request) = to_message_request(action) else {
            debug!(action = action.kind_name(), "no messenger message for action");
            self.send_signals(&token, action).await;
            return Ok(());
        };

        match &action.kind {
            ActionKind::Attachment {
                kind,
                source: AttachmentSource::Url(url),
            } => {
                self.send_url_attachment(&token, (*kind).into(), url, request)
                    .await?;
            }
            ActionKind::Attachment {
                kind,
                source:
                    AttachmentSource::Binary {
                        bytes,
                        mime_type,
                        file_name,
                    },
            } => {
                let uploaded = self
                    .client
                    .upload_attachment(&token, (*kind).into(), bytes, mime_type, file_name)
                    .await?;
                let attachment_id = uploaded.attachment_id.ok_or_else(|| {
                    CourierError::connector("attachment upload returned no attachment id")
                })?;
                set_attachment_payload(&mut request, AttachmentPayload::attachment_id(attachment_id));
                self.client.send_message(&token, &request).await?;
            }
            _ => {
                self.client.send_message(&token, &request).await?;
            }
        }

        self.send_signals(&token, action).await;
        Ok(())
    }

    /// Reuses the cached attachment id, uploading on a miss. When the upload
    /// fails the message goes out with the reusable URL, and the id the
    /// platform returns is cached.
    async fn send_url_attachment(
        &self,
        token: &str,
        kind: OutAttachmentType,
        url: &str,
        mut request: MessageRequest,
    ) -> Result<(), CourierError> {
        let cached = self
            .cache
            .get_or_upload(&self.application_id, url, || async {
                let response = self
                    .client
                    .send_attachment(token, &AttachmentRequest::reusable(kind, url))
                    .await?;
                response.attachment_id.ok_or_else(|| {
                    CourierError::connector("attachment upload returned no attachment id")
                })
            })
            .await;

        match cached {
            Ok(attachment_id) => {
                set_attachment_payload(&mut request, AttachmentPayload::attachment_id(attachment_id));
                self.client.send_message(token, &request).await?;
            }
            Err(e) => {
                warn!(url, error = %e, "attachment upload failed, sending by url");
                let response = self.client.send_message(token, &request).await?;
                if let Some(attachment_id) = response.attachment_id {
                    self.cache.insert(&self.application_id, url, attachment_id);
                }
            }
        }
        Ok(())
    }

    async fn send_signals(&self, token: &str, action: &Action) {
        let recipient = Recipient::id(action.recipient_id.clone());
        let actions: &[SenderAction] = if action.metadata.last_answer {
            &[SenderAction::TypingOff, SenderAction::MarkSeen]
        } else {
            &[SenderAction::TypingOn]
        };
        for sender_action in actions {
            let request = ActionRequest {
                recipient: recipient.clone(),
                sender_action: *sender_action,
            };
            self.client.send_action(token, &request).await;
        }
    }
}

fn set_attachment_payload(request: &mut MessageRequest, payload: AttachmentPayload) {
    if let Some(attachment) = request.message.attachment.as_mut() {
        attachment.payload = payload;
    }
}
