// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps decoded Messenger sub-events onto platform-neutral events.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use tracing::{debug, warn};

use courier_core::choice::{NLP_PARAMETER, decode_choice_id};
use courier_core::{AppRole, AttachmentKind, Event, EventKind};

use crate::webhook::{
    AccountLinkingStatus, AttachmentType, MessageBody, Webhook, WebhookPayload,
};

/// Converts a sub-event into an event for `connector_id`.
///
/// Returns `None` for echoes, unknown sub-events, and sub-events missing a
/// field the event needs (no user, no postback payload, no authorization code).
pub fn to_event(webhook: &Webhook, connector_id: &str) -> Option<Event> {
    let page_id = webhook.page_id().unwrap_or_default();

    // App roles are page-level: there is no user.
    if let WebhookPayload::AppRoles(roles) = &webhook.payload {
        let kind = EventKind::AppRoles {
            roles: read_roles(roles),
        };
        return Some(Event::new(page_id, page_id, connector_id, kind));
    }

    let Some(user_id) = webhook.user_id() else {
        warn!(page_id, "sub-event without user, skipped");
        return None;
    };

    let kind = match &webhook.payload {
        WebhookPayload::Message(message) => read_message(message),
        WebhookPayload::Echo(message) => {
            debug!(mid = ?message.mid, "echo ignored");
            return None;
        }
        WebhookPayload::Postback(postback) => {
            let Some(payload) = postback.payload.as_deref() else {
                warn!(user_id, "postback without payload, skipped");
                return None;
            };
            let (intent, parameters) = decode_choice_id(payload);
            EventKind::Choice { intent, parameters }
        }
        WebhookPayload::Optin(optin) => EventKind::Subscribing {
            reference: optin
                .reference
                .clone()
                .or_else(|| optin.user_ref.clone())
                .unwrap_or_default(),
        },
        WebhookPayload::AccountLinking(linking) => match linking.status {
            AccountLinkingStatus::Linked => {
                let Some(code) = linking.authorization_code.clone() else {
                    warn!(user_id, "account linked without authorization code, skipped");
                    return None;
                };
                EventKind::Login { auth_code: code }
            }
            AccountLinkingStatus::Unlinked => EventKind::Logout,
        },
        WebhookPayload::RequestThreadControl(request) => EventKind::RequestThreadControl {
            requested_owner_app_id: request.requested_owner_app_id.clone(),
            metadata: request.metadata.clone(),
        },
        WebhookPayload::PassThreadControl(pass) => EventKind::PassThreadControl {
            new_owner_app_id: pass.new_owner_app_id.clone(),
            metadata: pass.metadata.clone(),
        },
        WebhookPayload::TakeThreadControl(take) => EventKind::TakeThreadControl {
            previous_owner_app_id: take.previous_owner_app_id.clone(),
            metadata: take.metadata.clone(),
        },
        WebhookPayload::Referral(referral) => EventKind::Referral {
            reference: referral.reference.clone(),
            source: referral.source.clone(),
            kind: referral.kind.clone(),
        },
        WebhookPayload::AppRoles(_) => return None,
        WebhookPayload::Unknown => {
            warn!(user_id, page_id, "unknown sub-event, skipped");
            return None;
        }
    };

    Some(
        Event::new(user_id, page_id, connector_id, kind)
            .with_correlation_id(webhook.message_id().map(str::to_string))
            .with_prior_message_id(webhook.prior_message.as_ref().map(|p| p.identifier.clone())),
    )
}

fn read_message(message: &MessageBody) -> EventKind {
    if let Some(quick_reply) = &message.quick_reply {
        if quick_reply.has_email_payload() {
            return sentence(message);
        }
        let (intent, mut parameters) = decode_choice_id(&quick_reply.payload);
        return match parameters.remove(NLP_PARAMETER) {
            Some(text) => EventKind::Sentence { text },
            None => EventKind::Choice { intent, parameters },
        };
    }

    let Some(first) = message.attachments.first() else {
        return sentence(message);
    };
    let payload = first.payload.clone().unwrap_or_default();
    match (first.kind, payload.url, payload.coordinates) {
        (Some(AttachmentType::Location), _, Some(coordinates)) => EventKind::Location {
            latitude: coordinates.lat,
            longitude: coordinates.long,
        },
        (Some(AttachmentType::Image), Some(url), _) => EventKind::Attachment {
            url,
            kind: AttachmentKind::Image,
        },
        (Some(AttachmentType::Audio), Some(url), _) => EventKind::Attachment {
            url,
            kind: AttachmentKind::Audio,
        },
        _ => sentence(message),
    }
}

fn sentence(message: &MessageBody) -> EventKind {
    EventKind::Sentence {
        text: message.text.clone().unwrap_or_default(),
    }
}

fn read_roles(roles: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, BTreeSet<AppRole>> {
    roles
        .iter()
        .map(|(app_id, names)| {
            let set = names
                .iter()
                .filter_map(|name| match AppRole::from_str(name) {
                    Ok(role) => Some(role),
                    Err(_) => {
                        warn!(app_id = %app_id, role = %name, "unknown app role");
                        None
                    }
                })
                .collect();
            (app_id.clone(), set)
        })
        .collect()
}
