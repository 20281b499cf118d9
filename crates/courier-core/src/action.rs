// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound actions produced by the bot engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::choice::encode_choice_id;
use crate::event::AttachmentKind;

/// Delivery priority hint.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

/// Reason for a message sent outside the standard messaging window.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    ConfirmedEventUpdate,
    PostPurchaseUpdate,
    AccountUpdate,
    HumanAgent,
}

/// Metadata attached to every action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionMetadata {
    /// Last answer of the current turn: ends the typing indicator.
    #[serde(default)]
    pub last_answer: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub notification_type: Option<NotificationType>,
}

/// Where the bytes of an outbound attachment come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentSource {
    /// A public URL the platform can fetch.
    Url(String),
    /// Raw bytes uploaded with the request.
    Binary {
        bytes: Vec<u8>,
        mime_type: String,
        file_name: String,
    },
}

/// A selectable option offered to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub title: String,
    pub intent: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Choice {
    /// Payload sent back by the platform when the user selects this choice.
    pub fn payload(&self) -> String {
        encode_choice_id(&self.intent, &self.parameters)
    }
}

/// The platform-neutral payload of an [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Plain text, optionally followed by free-text suggestions.
    Text {
        text: String,
        #[serde(default)]
        suggestions: Vec<String>,
    },
    /// Media referenced by URL or sent as bytes.
    Attachment {
        kind: AttachmentKind,
        source: AttachmentSource,
    },
    /// Text followed by a set of choices.
    ChoiceSet { text: String, choices: Vec<Choice> },
    /// A location pin.
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
}

/// An outbound action for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Platform id of the user.
    pub recipient_id: String,
    /// Connector id sending the action.
    pub application_id: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub metadata: ActionMetadata,
}

impl Action {
    /// Creates an action with default metadata.
    pub fn new(
        recipient_id: impl Into<String>,
        application_id: impl Into<String>,
        kind: ActionKind,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            application_id: application_id.into(),
            kind,
            metadata: ActionMetadata::default(),
        }
    }

    /// Creates a plain text action.
    pub fn text(
        recipient_id: impl Into<String>,
        application_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            recipient_id,
            application_id,
            ActionKind::Text {
                text: text.into(),
                suggestions: Vec::new(),
            },
        )
    }

    /// Marks the action as the last answer of the turn.
    pub fn last_answer(mut self) -> Self {
        self.metadata.last_answer = true;
        self
    }

    /// Short name of the action kind, used for logs and timer names.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ActionKind::Text { .. } => "text",
            ActionKind::Attachment { .. } => "attachment",
            ActionKind::ChoiceSet { .. } => "choice_set",
            ActionKind::Location { .. } => "location",
        }
    }
}
