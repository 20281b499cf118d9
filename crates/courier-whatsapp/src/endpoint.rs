// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound side: the webhook endpoint of one business phone number.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::signature::{self, SignatureAlgorithm};
use courier_core::telemetry::record_event;
use courier_core::{
    ChallengeQuery, ConnectorRegistry, ConnectorType, CourierError, WebhookEndpoint,
};

use crate::client::WhatsAppClient;
use crate::connector::ContactNames;
use crate::hash_cache::ThreadHashCache;
use crate::normalizer::{MediaResolver, to_event};
use crate::webhook::{InboundMessage, WebhookEnvelope};

pub struct WhatsAppEndpoint {
    path: String,
    connector_id: String,
    phone_number_id: String,
    app_secret: String,
    verify_token: String,
    mode: String,
    restricted: HashSet<String>,
    client: Arc<WhatsAppClient>,
    registry: Arc<ConnectorRegistry>,
    hash_cache: Option<Arc<ThreadHashCache>>,
    contacts: ContactNames,
}

impl std::fmt::Debug for WhatsAppEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppEndpoint")
            .field("path", &self.path)
            .field("connector_id", &self.connector_id)
            .field("phone_number_id", &self.phone_number_id)
            .field("app_secret", &"[redacted]")
            .field("verify_token", &"[redacted]")
            .finish()
    }
}

/// Builder input for [`WhatsAppEndpoint`].
pub struct EndpointParams {
    pub path: String,
    pub connector_id: String,
    pub phone_number_id: String,
    pub app_secret: String,
    pub verify_token: String,
    pub mode: String,
    /// Numbers allowed to reach the bot; empty means everyone.
    pub restricted_phone_numbers: Vec<String>,
}

impl WhatsAppEndpoint {
    pub fn new(
        params: EndpointParams,
        client: Arc<WhatsAppClient>,
        registry: Arc<ConnectorRegistry>,
        hash_cache: Option<Arc<ThreadHashCache>>,
        contacts: ContactNames,
    ) -> Self {
        Self {
            path: params.path,
            connector_id: params.connector_id,
            phone_number_id: params.phone_number_id,
            app_secret: params.app_secret,
            verify_token: params.verify_token,
            mode: params.mode,
            restricted: params.restricted_phone_numbers.into_iter().collect(),
            client,
            registry,
            hash_cache,
            contacts,
        }
    }

    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    fn allowed(&self, number: &str) -> bool {
        self.restricted.is_empty() || self.restricted.contains(number)
    }

    fn sender_id(&self, number: &str) -> String {
        match &self.hash_cache {
            Some(cache) => cache.hash(&self.phone_number_id, number),
            None => number.to_string(),
        }
    }
}

/// Resolves media ids with the connector's token.
struct TokenMediaResolver<'a> {
    client: &'a WhatsAppClient,
    token: &'a str,
}

#[async_trait]
impl MediaResolver for TokenMediaResolver<'_> {
    async fn media_url(&self, media_id: &str) -> Result<String, CourierError> {
        self.client.media_url(media_id, self.token).await
    }
}

#[async_trait]
impl WebhookEndpoint for WhatsAppEndpoint {
    fn path(&self) -> &str {
        &self.path
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::WhatsappCloud
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Sha256
    }

    fn verify_signature(&self, header: Option<&str>, body: &[u8]) -> bool {
        header.is_some_and(|h| {
            signature::verify(SignatureAlgorithm::Sha256, &self.app_secret, body, h)
        })
    }

    fn verify_challenge(&self, query: &ChallengeQuery) -> Option<String> {
        let mode_ok = query.mode.as_deref() == Some(self.mode.as_str());
        let token_ok = query.verify_token.as_deref() == Some(self.verify_token.as_str());
        if mode_ok && token_ok {
            query.challenge.clone()
        } else {
            warn!(path = %self.path, mode_ok, token_ok, "subscription handshake rejected");
            None
        }
    }

    async fn process(&self, body: &[u8]) -> Result<usize, CourierError> {
        let envelope: WebhookEnvelope = serde_json::from_slice(body)
            .map_err(|e| CourierError::decode("invalid whatsapp callback", e))?;
        let token = self.registry.token_for(&self.connector_id)?;
        let controller = self.registry.controller_for(&self.connector_id)?;
        let resolver = TokenMediaResolver {
            client: &self.client,
            token: &token,
        };

        let mut handled = 0;
        for change in envelope.entry.iter().flat_map(|entry| &entry.changes) {
            let value = match change.decode() {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        path = %self.path,
                        field = %change.field,
                        error = %e,
                        "undecodable change skipped"
                    );
                    continue;
                }
            };
            if value.metadata.phone_number_id != self.phone_number_id {
                debug!(
                    phone_number_id = %value.metadata.phone_number_id,
                    path = %self.path,
                    "change for another number, skipped"
                );
                continue;
            }
            if !value.statuses.is_empty() {
                debug!(count = value.statuses.len(), "delivery statuses ignored");
            }

            for raw in &value.messages {
                let message = match InboundMessage::decode(raw) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(path = %self.path, error = %e, "undecodable message skipped");
                        continue;
                    }
                };
                if !self.allowed(&message.from) {
                    debug!(message_id = %message.id, "sender not in allowlist, skipped");
                    continue;
                }
                let sender_id = self.sender_id(&message.from);
                if let Some(name) = value.contact_name(&message.from) {
                    self.contacts.insert(sender_id.clone(), name.to_string());
                }

                let Some(event) = to_event(
                    &message,
                    &sender_id,
                    &self.phone_number_id,
                    &self.connector_id,
                    &resolver,
                )
                .await
                else {
                    continue;
                };

                let kind = event.kind_name();
                record_event("whatsapp", kind);
                if let Err(e) = controller.handle(event).await {
                    warn!(
                        connector_id = %self.connector_id,
                        kind,
                        error = %e,
                        "controller failed to handle event"
                    );
                }
                handled += 1;
            }
        }
        debug!(path = %self.path, handled, "whatsapp callback processed");
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_config::model::WhatsAppConfig;
    use dashmap::DashMap;

    fn endpoint(restricted: Vec<String>) -> WhatsAppEndpoint {
        let client = WhatsAppClient::new(&WhatsAppConfig::default()).expect("client");
        WhatsAppEndpoint::new(
            EndpointParams {
                path: "/whatsapp".into(),
                connector_id: "wa".into(),
                phone_number_id: "PN1".into(),
                app_secret: "secret".into(),
                verify_token: "verify-me".into(),
                mode: "subscribe".into(),
                restricted_phone_numbers: restricted,
            },
            Arc::new(client),
            Arc::new(ConnectorRegistry::new()),
            None,
            Arc::new(DashMap::new()),
        )
    }

    fn query(mode: &str, token: &str) -> ChallengeQuery {
        ChallengeQuery {
            mode: Some(mode.into()),
            verify_token: Some(token.into()),
            challenge: Some("1158201444".into()),
        }
    }

    #[test]
    fn challenge_requires_mode_and_token() {
        let ep = endpoint(Vec::new());
        assert_eq!(
            ep.verify_challenge(&query("subscribe", "verify-me")).as_deref(),
            Some("1158201444")
        );
        assert!(ep.verify_challenge(&query("unsubscribe", "verify-me")).is_none());
        assert!(ep.verify_challenge(&query("subscribe", "nope")).is_none());
        assert!(ep.verify_challenge(&ChallengeQuery::default()).is_none());
    }

    #[test]
    fn allowlist() {
        let open = endpoint(Vec::new());
        assert!(open.allowed("33600000000"));

        let closed = endpoint(vec!["33611111111".into()]);
        assert!(closed.allowed("33611111111"));
        assert!(!closed.allowed("33600000000"));
    }

    #[test]
    fn signature_uses_sha256() {
        let ep = endpoint(Vec::new());
        let body = br#"{"object":"whatsapp_business_account","entry":[]}"#;
        let header = signature::sign(SignatureAlgorithm::Sha256, "secret", body);
        assert!(ep.verify_signature(Some(&header), body));
        assert!(!ep.verify_signature(None, body));
        let sha1 = signature::sign(SignatureAlgorithm::Sha1, "secret", body);
        assert!(!ep.verify_signature(Some(&sha1), body));
    }
}
