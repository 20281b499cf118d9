// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback bodies and connector configurations shared by integration tests.

use serde_json::{Value, json};

use courier_config::model::{
    MessengerConfig, MessengerConnectorConfig, WhatsAppConfig, WhatsAppConnectorConfig,
};
use courier_core::signature::{SignatureAlgorithm, sign};

pub const MESSENGER_SECRET: &str = "messenger-app-secret";
pub const WHATSAPP_SECRET: &str = "whatsapp-app-secret";
pub const VERIFY_TOKEN: &str = "verify-me";

/// Serializes `body` and signs it, returning the raw bytes and the header value.
pub fn signed(algorithm: SignatureAlgorithm, secret: &str, body: &Value) -> (Vec<u8>, String) {
    let bytes = body.to_string().into_bytes();
    let header = sign(algorithm, secret, &bytes);
    (bytes, header)
}

/// A page callback carrying one text message from `user_id` to `page_id`.
pub fn messenger_text_callback(page_id: &str, user_id: &str, text: &str, mid: &str) -> Value {
    messenger_callback(
        page_id,
        vec![json!({
            "sender": {"id": user_id},
            "recipient": {"id": page_id},
            "timestamp": 1_700_000_000_000u64,
            "message": {"mid": mid, "text": text}
        })],
    )
}

/// A page callback with the given `messaging` sub-events.
pub fn messenger_callback(page_id: &str, messaging: Vec<Value>) -> Value {
    json!({
        "object": "page",
        "entry": [{
            "id": page_id,
            "time": 1_700_000_000_000u64,
            "messaging": messaging
        }]
    })
}

pub fn messenger_connector(
    connector_id: &str,
    application_id: &str,
    page_id: &str,
    path: &str,
) -> MessengerConnectorConfig {
    MessengerConnectorConfig {
        connector_id: connector_id.to_string(),
        application_id: application_id.to_string(),
        page_id: page_id.to_string(),
        path: path.to_string(),
        token: format!("token-{connector_id}"),
        app_token: Some(format!("app-token-{application_id}")),
        secret: MESSENGER_SECRET.to_string(),
        verify_token: Some(VERIFY_TOKEN.to_string()),
    }
}

/// Messenger settings pointing at `base_url` with fast retries.
pub fn messenger_config(base_url: &str, connectors: Vec<MessengerConnectorConfig>) -> MessengerConfig {
    MessengerConfig {
        api_base_url: base_url.to_string(),
        status_url: format!("{base_url}/platform/api-status"),
        retry_wait_ms: 10,
        connectors,
        ..MessengerConfig::default()
    }
}

/// A WhatsApp Cloud callback carrying one text message.
pub fn whatsapp_text_callback(phone_number_id: &str, from: &str, text: &str, id: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550001111",
                        "phone_number_id": phone_number_id
                    },
                    "contacts": [{"profile": {"name": "Ada"}, "wa_id": from}],
                    "messages": [{
                        "from": from,
                        "id": id,
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": text}
                    }]
                }
            }]
        }]
    })
}

pub fn whatsapp_connector(
    connector_id: &str,
    phone_number_id: &str,
    path: &str,
) -> WhatsAppConnectorConfig {
    WhatsAppConnectorConfig {
        connector_id: connector_id.to_string(),
        application_id: format!("app-{connector_id}"),
        phone_number_id: phone_number_id.to_string(),
        business_account_id: None,
        path: path.to_string(),
        token: format!("token-{connector_id}"),
        app_secret: WHATSAPP_SECRET.to_string(),
        verify_token: VERIFY_TOKEN.to_string(),
        mode: "subscribe".to_string(),
    }
}

pub fn whatsapp_config(base_url: &str, connectors: Vec<WhatsAppConnectorConfig>) -> WhatsAppConfig {
    WhatsAppConfig {
        api_base_url: base_url.to_string(),
        connectors,
        ..WhatsAppConfig::default()
    }
}
