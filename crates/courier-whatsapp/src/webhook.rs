// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloud API webhook envelope.
//!
//! `{object, entry: [{id, changes: [{field, value}]}]}`, where `value` holds
//! the receiving number's metadata, the sender contacts, the messages and the
//! delivery statuses.
//!
//! Change values and messages stay raw JSON until the endpoint decodes them
//! one by one, so a malformed item never takes its siblings down with it.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

/// Changes of one business account.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Change {
    pub fn decode(&self) -> Result<ChangeValue, serde_json::Error> {
        ChangeValue::deserialize(&self.value)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    pub metadata: Metadata,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

impl ChangeValue {
    /// Profile name of the sender `wa_id`, when the platform sent it.
    pub fn contact_name(&self, wa_id: &str) -> Option<&str> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == wa_id)
            .and_then(|c| c.profile.as_ref())
            .map(|p| p.name.as_str())
    }
}

impl InboundMessage {
    pub fn decode(raw: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(raw)
    }
}

/// The business phone number that received the change.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: String,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub wa_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

/// One inbound message. The payload lives in the field named by `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub text: Option<Text>,
    #[serde(default)]
    pub interactive: Option<InteractiveReply>,
    #[serde(default)]
    pub button: Option<ButtonReply>,
    #[serde(default)]
    pub image: Option<Media>,
    #[serde(default)]
    pub audio: Option<Media>,
    #[serde(default)]
    pub video: Option<Media>,
    #[serde(default)]
    pub document: Option<Media>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Interactive,
    Button,
    Image,
    Audio,
    Video,
    Document,
    Location,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Text {
    pub body: String,
}

/// Answer to an interactive message: a reply button or a list row.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractiveReply {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub button_reply: Option<ReplyPayload>,
    #[serde(default)]
    pub list_reply: Option<ReplyPayload>,
}

impl InteractiveReply {
    /// Id of the selected button or row.
    pub fn selected_id(&self) -> Option<&str> {
        self.button_reply
            .as_ref()
            .or(self.list_reply.as_ref())
            .map(|r| r.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyPayload {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Quick reply button of a template message.
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonReply {
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_text_message_change() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "15550001111", "phone_number_id": "PN1"},
                        "contacts": [{"profile": {"name": "Ada"}, "wa_id": "33612345678"}],
                        "messages": [{"from": "33612345678", "id": "wamid.1", "timestamp": "1700000000",
                                      "type": "text", "text": {"body": "hi"}}]
                    }
                }]
            }]
        }))
        .unwrap();

        let value = envelope.entry[0].changes[0].decode().unwrap();
        assert_eq!(value.metadata.phone_number_id, "PN1");
        assert_eq!(value.contact_name("33612345678"), Some("Ada"));
        let message = InboundMessage::decode(&value.messages[0]).unwrap();
        assert_eq!(message.kind, MessageType::Text);
        assert_eq!(message.text.as_ref().unwrap().body, "hi");
    }

    #[test]
    fn unknown_message_type_is_unsupported() {
        let message: InboundMessage = serde_json::from_value(json!({
            "from": "1", "id": "wamid.2", "type": "sticker", "sticker": {"id": "s1"}
        }))
        .unwrap();
        assert_eq!(message.kind, MessageType::Unsupported);
    }

    #[test]
    fn list_reply_selected_id() {
        let message: InboundMessage = serde_json::from_value(json!({
            "from": "1", "id": "wamid.3", "type": "interactive",
            "interactive": {"type": "list_reply",
                            "list_reply": {"id": "menu?_step=pizza", "title": "Pizza", "description": "Large"}}
        }))
        .unwrap();
        assert_eq!(
            message.interactive.unwrap().selected_id(),
            Some("menu?_step=pizza")
        );
    }

    #[test]
    fn status_only_change_has_no_messages() {
        let value: ChangeValue = serde_json::from_value(json!({
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": "1", "phone_number_id": "PN1"},
            "statuses": [{"id": "wamid.1", "status": "delivered"}]
        }))
        .unwrap();
        assert!(value.messages.is_empty());
        assert_eq!(value.statuses.len(), 1);
    }

    #[test]
    fn malformed_message_fails_alone() {
        let value: ChangeValue = serde_json::from_value(json!({
            "metadata": {"phone_number_id": "PN1"},
            "messages": [
                {"from": "1", "id": "wamid.4", "type": "text", "text": {}},
                {"from": "1", "id": "wamid.5", "type": "text", "text": {"body": "ok"}}
            ]
        }))
        .unwrap();
        assert!(InboundMessage::decode(&value.messages[0]).is_err());
        let ok = InboundMessage::decode(&value.messages[1]).unwrap();
        assert_eq!(ok.text.unwrap().body, "ok");
    }

    #[test]
    fn change_without_metadata_fails_to_decode() {
        let change: Change = serde_json::from_value(json!({
            "field": "messages",
            "value": {"messages": []}
        }))
        .unwrap();
        assert!(change.decode().is_err());
    }
}
