// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds Send API requests from actions.

use tracing::warn;

use courier_core::choice::encode_nlp_choice_id;
use courier_core::{Action, ActionKind, AttachmentSource};

use crate::types::{
    AttachmentPayload, MessageRequest, MessagingType, OutAttachment, OutMessage, QuickReply,
    Recipient,
};

/// Most quick replies the platform accepts on one message.
pub const MAX_QUICK_REPLIES: usize = 13;

/// Translates an action into a message request.
///
/// Attachments given as bytes get an empty payload: the connector uploads
/// them and fills in the attachment id. Returns `None` for locations, which
/// the platform cannot send.
pub fn to_message_request(action: &Action) -> Option<MessageRequest> {
    let message = match &action.kind {
        ActionKind::Text { text, suggestions } => OutMessage {
            text: Some(text.clone()),
            attachment: None,
            quick_replies: quick_replies(
                action,
                suggestions
                    .iter()
                    .map(|s| QuickReply::text(s.clone(), encode_nlp_choice_id(s))),
            ),
        },
        ActionKind::ChoiceSet { text, choices } => OutMessage {
            text: Some(text.clone()),
            attachment: None,
            quick_replies: quick_replies(
                action,
                choices
                    .iter()
                    .map(|c| QuickReply::text(c.title.clone(), c.payload())),
            ),
        },
        ActionKind::Attachment { kind, source } => {
            let payload = match source {
                AttachmentSource::Url(url) => AttachmentPayload::reusable_url(url.clone()),
                AttachmentSource::Binary { .. } => AttachmentPayload::default(),
            };
            OutMessage {
                text: None,
                attachment: Some(OutAttachment {
                    kind: (*kind).into(),
                    payload,
                }),
                quick_replies: Vec::new(),
            }
        }
        ActionKind::Location { .. } => {
            warn!(
                recipient_id = %action.recipient_id,
                connector_id = %action.application_id,
                "location actions are not supported by messenger, skipped"
            );
            return None;
        }
    };

    let (messaging_type, tag) = match action.metadata.notification_type {
        Some(tag) => (MessagingType::MessageTag, Some(tag)),
        None => (MessagingType::Response, None),
    };

    Some(MessageRequest {
        recipient: Recipient::id(action.recipient_id.clone()),
        message,
        messaging_type,
        tag,
    })
}

fn quick_replies(action: &Action, replies: impl Iterator<Item = QuickReply>) -> Vec<QuickReply> {
    let mut replies: Vec<QuickReply> = replies.collect();
    if replies.len() > MAX_QUICK_REPLIES {
        warn!(
            recipient_id = %action.recipient_id,
            count = replies.len(),
            "too many quick replies, keeping the first {MAX_QUICK_REPLIES}"
        );
        replies.truncate(MAX_QUICK_REPLIES);
    }
    replies
}
