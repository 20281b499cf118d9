// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound side of a platform connector, mounted by the gateway.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::CourierError;
use crate::signature::SignatureAlgorithm;
use crate::types::ConnectorType;

/// Body returned when the subscription handshake is rejected.
pub const INVALID_VERIFY_TOKEN: &str = "Invalid verify token";

/// Query parameters of the webhook subscription handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChallengeQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// A webhook path served by the gateway.
///
/// The gateway verifies the signature header against the raw body before
/// calling [`process`](WebhookEndpoint::process); unsigned or mis-signed
/// bodies never reach the endpoint.
#[async_trait]
pub trait WebhookEndpoint: Send + Sync + 'static {
    /// Path the endpoint is mounted on, starting with `/`.
    fn path(&self) -> &str;

    fn connector_type(&self) -> ConnectorType;

    /// Algorithm (and therefore header) used to sign callbacks.
    fn signature_algorithm(&self) -> SignatureAlgorithm;

    /// Verifies the signature header against the exact raw body.
    fn verify_signature(&self, header: Option<&str>, body: &[u8]) -> bool;

    /// Answers the subscription handshake: `Some(challenge)` to echo, `None` to reject.
    fn verify_challenge(&self, query: &ChallengeQuery) -> Option<String>;

    /// Parses, normalizes, and dispatches a verified callback body.
    ///
    /// Returns the number of events handed to controllers.
    async fn process(&self, body: &[u8]) -> Result<usize, CourierError>;
}
