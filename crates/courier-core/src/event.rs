// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalized inbound events handed to the bot engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of media carried by an attachment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    File,
}

/// Role of an application in the handover protocol.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    PrimaryReceiver,
    SecondaryReceiver,
}

/// The platform-neutral payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Free text typed by the user.
    Sentence { text: String },
    /// A decoded quick reply or postback.
    Choice {
        intent: String,
        parameters: BTreeMap<String, String>,
    },
    /// Media sent by the user.
    Attachment { url: String, kind: AttachmentKind },
    /// A shared location.
    Location { latitude: f64, longitude: f64 },
    /// Account linking completed.
    Login { auth_code: String },
    /// Account unlinked.
    Logout,
    /// The user opted in through a plugin or a referral link.
    Subscribing { reference: String },
    /// Another application asks for thread control.
    RequestThreadControl {
        requested_owner_app_id: String,
        metadata: Option<String>,
    },
    /// Thread control was passed to an application.
    PassThreadControl {
        new_owner_app_id: String,
        metadata: Option<String>,
    },
    /// Thread control was taken from an application.
    TakeThreadControl {
        previous_owner_app_id: String,
        metadata: Option<String>,
    },
    /// Roles of the applications subscribed to the page.
    AppRoles {
        roles: BTreeMap<String, BTreeSet<AppRole>>,
    },
    /// The user arrived from a referral link, ad, or plugin.
    Referral {
        reference: Option<String>,
        source: Option<String>,
        kind: Option<String>,
    },
}

/// A normalized inbound event.
///
/// Created by a connector's normalizer and consumed once by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Platform id of the user.
    pub sender_id: String,
    /// Platform id of the bot (page or phone number).
    pub recipient_id: String,
    /// Connector id that received the event.
    pub application_id: String,
    /// Platform message id, when the platform provides one.
    pub correlation_id: Option<String>,
    /// Identifier of a prior message, used to correlate standby traffic with a later transfer.
    pub prior_message_id: Option<String>,
    /// True when the event was observed while another application owned the thread.
    pub notification: bool,
    /// Owner of the thread when `notification` is set.
    pub source_application_id: Option<String>,
    pub kind: EventKind,
}

impl Event {
    /// Creates an event with no correlation data.
    pub fn new(
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
        application_id: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            application_id: application_id.into(),
            correlation_id: None,
            prior_message_id: None,
            notification: false,
            source_application_id: None,
            kind,
        }
    }

    /// Sets the platform message id.
    pub fn with_correlation_id(mut self, id: Option<String>) -> Self {
        self.correlation_id = id;
        self
    }

    /// Sets the prior message identifier.
    pub fn with_prior_message_id(mut self, id: Option<String>) -> Self {
        self.prior_message_id = id;
        self
    }

    /// Marks the event as observed on the standby channel.
    pub fn mark_notification(&mut self, source_application_id: Option<String>) {
        self.notification = true;
        self.source_application_id = source_application_id;
    }

    /// Short name of the event kind, used for logs and metric labels.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            EventKind::Sentence { .. } => "sentence",
            EventKind::Choice { .. } => "choice",
            EventKind::Attachment { .. } => "attachment",
            EventKind::Location { .. } => "location",
            EventKind::Login { .. } => "login",
            EventKind::Logout => "logout",
            EventKind::Subscribing { .. } => "subscribing",
            EventKind::RequestThreadControl { .. } => "request_thread_control",
            EventKind::PassThreadControl { .. } => "pass_thread_control",
            EventKind::TakeThreadControl { .. } => "take_thread_control",
            EventKind::AppRoles { .. } => "app_roles",
            EventKind::Referral { .. } => "referral",
        }
    }
}
