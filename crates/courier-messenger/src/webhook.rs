// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger webhook callback model.
//!
//! The envelope is decoded in one pass, but each sub-event of an entry stays a
//! raw [`serde_json::Value`] until [`Webhook::from_value`] decodes it, so one
//! malformed sub-event never aborts its siblings.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use courier_core::CourierError;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$")
        .expect("email pattern is valid")
});

/// Accepts ids the platform sends either as JSON strings or as numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);
    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

/// Top-level callback body.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

/// Callbacks for one page.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Page id.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub time: i64,
    /// Sub-events received while this application owns the thread.
    #[serde(default)]
    pub messaging: Option<Vec<serde_json::Value>>,
    /// Sub-events observed while another application owns the thread.
    #[serde(default)]
    pub standby: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Party {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub user_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriorMessage {
    #[serde(default)]
    pub source: Option<String>,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuickReplyPayload {
    pub payload: String,
}

impl QuickReplyPayload {
    /// The platform fills email quick replies with the address itself.
    pub fn has_email_payload(&self) -> bool {
        EMAIL_PATTERN.is_match(&self.payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    Image,
    Audio,
    Video,
    File,
    Location,
    Fallback,
    Template,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundAttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundAttachment {
    #[serde(default, rename = "type")]
    pub kind: Option<AttachmentType>,
    #[serde(default)]
    pub payload: Option<InboundAttachmentPayload>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub app_id: Option<String>,
    #[serde(default)]
    pub quick_reply: Option<QuickReplyPayload>,
    #[serde(default)]
    pub attachments: Vec<InboundAttachment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Optin {
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub user_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountLinkingStatus {
    Linked,
    Unlinked,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountLinking {
    pub status: AccountLinkingStatus,
    #[serde(default)]
    pub authorization_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestThreadControl {
    #[serde(deserialize_with = "string_or_number")]
    pub requested_owner_app_id: String,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PassThreadControl {
    #[serde(deserialize_with = "string_or_number")]
    pub new_owner_app_id: String,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TakeThreadControl {
    #[serde(deserialize_with = "string_or_number")]
    pub previous_owner_app_id: String,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Referral {
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// What a sub-event carries. Decided by the first field present, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookPayload {
    Message(MessageBody),
    Echo(MessageBody),
    Postback(Postback),
    Optin(Optin),
    AccountLinking(AccountLinking),
    AppRoles(BTreeMap<String, Vec<String>>),
    RequestThreadControl(RequestThreadControl),
    PassThreadControl(PassThreadControl),
    TakeThreadControl(TakeThreadControl),
    Referral(Referral),
    Unknown,
}

/// One decoded sub-event.
#[derive(Debug, Clone, PartialEq)]
pub struct Webhook {
    pub sender: Option<Party>,
    pub recipient: Party,
    pub timestamp: i64,
    pub prior_message: Option<PriorMessage>,
    pub payload: WebhookPayload,
}

#[derive(Deserialize)]
struct RawWebhook {
    #[serde(default)]
    sender: Option<Party>,
    #[serde(default)]
    recipient: Party,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    prior_message: Option<PriorMessage>,
    #[serde(default)]
    message: Option<MessageBody>,
    #[serde(default)]
    postback: Option<Postback>,
    #[serde(default)]
    optin: Option<Optin>,
    #[serde(default)]
    account_linking: Option<AccountLinking>,
    #[serde(default)]
    app_roles: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    request_thread_control: Option<RequestThreadControl>,
    #[serde(default)]
    pass_thread_control: Option<PassThreadControl>,
    #[serde(default)]
    take_thread_control: Option<TakeThreadControl>,
    #[serde(default)]
    referral: Option<Referral>,
}

impl Webhook {
    /// Decodes one sub-event.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CourierError> {
        let raw: RawWebhook = serde_json::from_value(value)
            .map_err(|e| CourierError::decode("invalid messenger sub-event", e))?;

        let payload = if let Some(mut message) = raw.message {
            // `[{}]` is sent for unsupported attachments.
            message.attachments.retain(|a| a.kind.is_some());
            if message.is_echo {
                WebhookPayload::Echo(message)
            } else {
                WebhookPayload::Message(message)
            }
        } else if let Some(postback) = raw.postback {
            WebhookPayload::Postback(postback)
        } else if let Some(optin) = raw.optin {
            WebhookPayload::Optin(optin)
        } else if let Some(linking) = raw.account_linking {
            WebhookPayload::AccountLinking(linking)
        } else if let Some(roles) = raw.app_roles {
            WebhookPayload::AppRoles(roles)
        } else if let Some(request) = raw.request_thread_control {
            WebhookPayload::RequestThreadControl(request)
        } else if let Some(pass) = raw.pass_thread_control {
            WebhookPayload::PassThreadControl(pass)
        } else if let Some(take) = raw.take_thread_control {
            WebhookPayload::TakeThreadControl(take)
        } else if let Some(referral) = raw.referral {
            WebhookPayload::Referral(referral)
        } else {
            WebhookPayload::Unknown
        };

        Ok(Self {
            sender: raw.sender,
            recipient: raw.recipient,
            timestamp: raw.timestamp,
            prior_message: raw.prior_message,
            payload,
        })
    }

    /// Id of the user: the sender id, else a `user_ref` from a checkbox opt-in.
    pub fn user_id(&self) -> Option<&str> {
        let from_sender = self
            .sender
            .as_ref()
            .and_then(|s| s.id.as_deref().or(s.user_ref.as_deref()));
        from_sender.or(match &self.payload {
            WebhookPayload::Optin(optin) => optin.user_ref.as_deref(),
            _ => None,
        })
    }

    /// Id of the page the sub-event was sent to.
    pub fn page_id(&self) -> Option<&str> {
        self.recipient.id.as_deref()
    }

    /// Platform message id, for message sub-events.
    pub fn message_id(&self) -> Option<&str> {
        match &self.payload {
            WebhookPayload::Message(m) | WebhookPayload::Echo(m) => m.mid.as_deref(),
            _ => None,
        }
    }
}
