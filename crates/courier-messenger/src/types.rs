// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send API request and response types.

use serde::{Deserialize, Serialize};

use courier_core::NotificationType;

/// Addressee of a send call: a page-scoped user id, or a `user_ref` after a checkbox opt-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ref: Option<String>,
}

impl Recipient {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            user_ref: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagingType {
    Response,
    Update,
    MessageTag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub recipient: Recipient,
    pub message: OutMessage,
    pub messaging_type: MessagingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<NotificationType>,
}

/// Message body: text or a single attachment, with optional quick replies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<OutAttachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutAttachmentType {
    Image,
    Audio,
    Video,
    File,
}

impl From<courier_core::AttachmentKind> for OutAttachmentType {
    fn from(kind: courier_core::AttachmentKind) -> Self {
        use courier_core::AttachmentKind;
        match kind {
            AttachmentKind::Image => Self::Image,
            AttachmentKind::Audio => Self::Audio,
            AttachmentKind::Video => Self::Video,
            AttachmentKind::File => Self::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutAttachment {
    #[serde(rename = "type")]
    pub kind: OutAttachmentType,
    pub payload: AttachmentPayload,
}

/// Either a URL to fetch (optionally reusable) or an already uploaded attachment id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reusable: Option<bool>,
}

impl AttachmentPayload {
    pub fn reusable_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            attachment_id: None,
            is_reusable: Some(true),
        }
    }

    pub fn attachment_id(id: impl Into<String>) -> Self {
        Self {
            url: None,
            attachment_id: Some(id.into()),
            is_reusable: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickReply {
    pub content_type: String,
    pub title: String,
    pub payload: String,
}

impl QuickReply {
    pub fn text(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// Body of `/me/message_attachments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRequest {
    pub message: OutMessage,
}

impl AttachmentRequest {
    pub fn reusable(kind: OutAttachmentType, url: &str) -> Self {
        Self {
            message: OutMessage {
                attachment: Some(OutAttachment {
                    kind,
                    payload: AttachmentPayload::reusable_url(url),
                }),
                ..OutMessage::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderAction {
    TypingOn,
    TypingOff,
    MarkSeen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub recipient: Recipient,
    pub sender_action: SenderAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassThreadControlRequest {
    pub recipient: Recipient,
    pub target_app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadControlRequest {
    pub recipient: Recipient,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Successful answer of the send endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}

/// Error body returned by the Graph API on non-2xx answers.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorContainer {
    #[serde(default)]
    pub error: Option<GraphError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_subcode: Option<i64>,
    #[serde(default)]
    pub fbtrace_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadOwnerResponse {
    #[serde(default)]
    pub data: Vec<ThreadOwnerData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadOwnerData {
    pub thread_owner: ThreadOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadOwner {
    #[serde(deserialize_with = "crate::webhook::string_or_number")]
    pub app_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecondaryReceiversResponse {
    #[serde(default)]
    pub data: Vec<SecondaryReceiver>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecondaryReceiver {
    #[serde(deserialize_with = "crate::webhook::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Answer of `GET /{appId}/subscriptions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionsResponse {
    #[serde(default)]
    pub data: Vec<Subscription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub fields: Vec<SubscriptionField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionField {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}

/// Body of `/{appId}/activities`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomEventRequest {
    pub event: String,
    /// JSON-encoded array of events, as the endpoint expects.
    pub custom_events: String,
    pub advertiser_tracking_enabled: u8,
    pub application_tracking_enabled: u8,
    pub extinfo: String,
    pub page_id: String,
    pub page_scoped_user_id: String,
}

impl CustomEventRequest {
    pub fn new(page_id: &str, user_id: &str, events: &[serde_json::Value]) -> Self {
        Self {
            event: "CUSTOM_APP_EVENTS".to_string(),
            custom_events: serde_json::Value::from(events.to_vec()).to_string(),
            advertiser_tracking_enabled: 0,
            application_tracking_enabled: 0,
            extinfo: "[\"mb1\"]".to_string(),
            page_id: page_id.to_string(),
            page_scoped_user_id: user_id.to_string(),
        }
    }
}
