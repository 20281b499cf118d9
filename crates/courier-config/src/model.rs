// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Courier.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Service identity and runtime settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Webhook HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Outbound delivery queue settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Messenger platform settings and connectors.
    #[serde(default)]
    pub messenger: MessengerConfig,

    /// WhatsApp Cloud platform settings and connectors.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// Service identity and runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in logs and health reports.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of webhook bodies processed concurrently.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            worker_pool_size: default_worker_pool_size(),
        }
    }
}

fn default_service_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_worker_pool_size() -> usize {
    16
}

/// Webhook HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind to.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

/// Outbound delivery queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Seconds a recipient lane may stay idle before it is dropped.
    #[serde(default = "default_lane_idle_timeout_secs")]
    pub lane_idle_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            lane_idle_timeout_secs: default_lane_idle_timeout_secs(),
        }
    }
}

fn default_lane_idle_timeout_secs() -> u64 {
    60
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Expose `/metrics` on the gateway.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Messenger platform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerConfig {
    /// Graph API base URL, including the API version.
    #[serde(default = "default_graph_api_base_url")]
    pub api_base_url: String,

    /// Platform status page used by health checks.
    #[serde(default = "default_status_url")]
    pub status_url: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Number of retries of a message send after a transient platform error.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Wait before retrying a message send, in milliseconds.
    #[serde(default = "default_retry_wait_ms")]
    pub retry_wait_ms: u64,

    /// Extra user profile fields needing special permissions (e.g. `locale,timezone`).
    #[serde(default)]
    pub extended_profile_fields: String,

    /// Periodically check and repair the webhook subscription.
    #[serde(default)]
    pub webhook_check_enabled: bool,

    /// Period of the webhook subscription check, in seconds.
    #[serde(default = "default_webhook_check_period_secs")]
    pub webhook_check_period_secs: u64,

    /// Callback URL used when re-subscribing. Defaults to the URL known by the platform.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Maximum number of cached attachment ids.
    #[serde(default = "default_attachment_cache_capacity")]
    pub attachment_cache_capacity: usize,

    /// Configured connectors, one per page and application.
    #[serde(default)]
    pub connectors: Vec<MessengerConnectorConfig>,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_graph_api_base_url(),
            status_url: default_status_url(),
            request_timeout_ms: default_request_timeout_ms(),
            retry_limit: default_retry_limit(),
            retry_wait_ms: default_retry_wait_ms(),
            extended_profile_fields: String::new(),
            webhook_check_enabled: false,
            webhook_check_period_secs: default_webhook_check_period_secs(),
            webhook_url: None,
            attachment_cache_capacity: default_attachment_cache_capacity(),
            connectors: Vec::new(),
        }
    }
}

fn default_graph_api_base_url() -> String {
    "https://graph.facebook.com/v20.0".to_string()
}

fn default_status_url() -> String {
    "https://www.facebook.com/platform/api-status".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_retry_limit() -> u32 {
    1
}

fn default_retry_wait_ms() -> u64 {
    5_000
}

fn default_webhook_check_period_secs() -> u64 {
    600
}

fn default_attachment_cache_capacity() -> usize {
    10_000
}

/// One Messenger connector: a page served by an application.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerConnectorConfig {
    pub connector_id: String,
    pub application_id: String,
    pub page_id: String,
    /// Webhook path, e.g. `/messenger`. Connectors of one application may share a path.
    pub path: String,
    /// Page access token.
    pub token: String,
    /// Application access token, used for subscription management.
    #[serde(default)]
    pub app_token: Option<String>,
    /// Application secret, signs webhook callbacks.
    pub secret: String,
    /// Token expected in the subscription handshake. `None` accepts any token.
    #[serde(default)]
    pub verify_token: Option<String>,
}

impl std::fmt::Debug for MessengerConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerConnectorConfig")
            .field("connector_id", &self.connector_id)
            .field("application_id", &self.application_id)
            .field("page_id", &self.page_id)
            .field("path", &self.path)
            .field("token", &"[redacted]")
            .field("app_token", &self.app_token.as_ref().map(|_| "[redacted]"))
            .field("secret", &"[redacted]")
            .field("verify_token", &self.verify_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// WhatsApp Cloud platform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API base URL, including the API version.
    #[serde(default = "default_graph_api_base_url")]
    pub api_base_url: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Seconds a hashed user id stays resolvable after its last use.
    #[serde(default = "default_hash_ttl_secs")]
    pub hash_ttl_secs: u64,

    /// Replace phone numbers by opaque hashes in events.
    #[serde(default = "default_true")]
    pub hash_user_ids: bool,

    /// When non-empty, only messages from these numbers are processed.
    #[serde(default)]
    pub restricted_phone_numbers: Vec<String>,

    /// Maximum number of cached media ids.
    #[serde(default = "default_attachment_cache_capacity")]
    pub attachment_cache_capacity: usize,

    /// Configured connectors, one per phone number.
    #[serde(default)]
    pub connectors: Vec<WhatsAppConnectorConfig>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_graph_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            hash_ttl_secs: default_hash_ttl_secs(),
            hash_user_ids: true,
            restricted_phone_numbers: Vec::new(),
            attachment_cache_capacity: default_attachment_cache_capacity(),
            connectors: Vec::new(),
        }
    }
}

fn default_hash_ttl_secs() -> u64 {
    3_600
}

/// One WhatsApp Cloud connector, bound to a business phone number.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConnectorConfig {
    pub connector_id: String,
    pub application_id: String,
    pub phone_number_id: String,
    #[serde(default)]
    pub business_account_id: Option<String>,
    /// Webhook path, e.g. `/whatsapp`.
    pub path: String,
    /// System user access token, sent as a bearer token.
    pub token: String,
    /// Application secret, signs webhook callbacks.
    pub app_secret: String,
    /// Token expected in the subscription handshake.
    pub verify_token: String,
    /// Mode expected in the subscription handshake.
    #[serde(default = "default_hub_mode")]
    pub mode: String,
}

fn default_hub_mode() -> String {
    "subscribe".to_string()
}

impl std::fmt::Debug for WhatsAppConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConnectorConfig")
            .field("connector_id", &self.connector_id)
            .field("application_id", &self.application_id)
            .field("phone_number_id", &self.phone_number_id)
            .field("business_account_id", &self.business_account_id)
            .field("path", &self.path)
            .field("token", &"[redacted]")
            .field("app_secret", &"[redacted]")
            .field("verify_token", &"[redacted]")
            .field("mode", &self.mode)
            .finish()
    }
}
