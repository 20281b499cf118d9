// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds Cloud API messages from actions.
//!
//! Up to three choices become reply buttons, more become a list. Media is
//! left without an id: the connector uploads it and fills the id in.

use tracing::warn;

use courier_core::choice::encode_nlp_choice_id;
use courier_core::{Action, ActionKind, AttachmentKind, AttachmentSource};

use crate::types::{
    ButtonAction, Interactive, InteractiveBody, ListAction, LocationBody, MediaRef, OutMessage,
    ReplyButton, Row, Section, TextBody,
};

pub const MAX_BUTTONS: usize = 3;
pub const MAX_ROWS: usize = 10;
pub const BUTTON_TITLE_MAX_LENGTH: usize = 20;
pub const BUTTON_ID_MAX_LENGTH: usize = 256;
pub const ROW_TITLE_MAX_LENGTH: usize = 24;
pub const ROW_ID_MAX_LENGTH: usize = 200;
const LIST_BUTTON_LABEL: &str = "Choose";

pub fn to_message(action: &Action) -> OutMessage {
    match &action.kind {
        ActionKind::Text { text, suggestions } if suggestions.is_empty() => OutMessage::Text {
            text: TextBody {
                body: text.clone(),
                preview_url: false,
            },
        },
        ActionKind::Text { text, suggestions } => interactive(
            action,
            text,
            suggestions
                .iter()
                .map(|s| (encode_nlp_choice_id(s), s.clone()))
                .collect(),
        ),
        ActionKind::ChoiceSet { text, choices } => interactive(
            action,
            text,
            choices.iter().map(|c| (c.payload(), c.title.clone())).collect(),
        ),
        ActionKind::Attachment { kind, source } => {
            let media = MediaRef {
                id: None,
                link: None,
                filename: match source {
                    AttachmentSource::Binary { file_name, .. } if *kind == AttachmentKind::File => {
                        Some(file_name.clone())
                    }
                    _ => None,
                },
            };
            match kind {
                AttachmentKind::Image => OutMessage::Image { image: media },
                AttachmentKind::Audio => OutMessage::Audio { audio: media },
                AttachmentKind::Video => OutMessage::Video { video: media },
                AttachmentKind::File => OutMessage::Document { document: media },
            }
        }
        ActionKind::Location {
            latitude,
            longitude,
            name,
            address,
        } => OutMessage::Location {
            location: LocationBody {
                latitude: *latitude,
                longitude: *longitude,
                name: name.clone(),
                address: address.clone(),
            },
        },
    }
}

/// `options` are `(id, title)` pairs.
fn interactive(action: &Action, text: &str, mut options: Vec<(String, String)>) -> OutMessage {
    let body = InteractiveBody {
        text: text.to_string(),
    };

    if options.len() <= MAX_BUTTONS {
        let buttons = options
            .into_iter()
            .map(|(id, title)| {
                check_length(action, "button id", &id, BUTTON_ID_MAX_LENGTH);
                ReplyButton::new(id, truncate(&title, BUTTON_TITLE_MAX_LENGTH))
            })
            .collect();
        return OutMessage::Interactive {
            interactive: Interactive::Button {
                body,
                action: ButtonAction { buttons },
            },
        };
    }

    if options.len() > MAX_ROWS {
        warn!(
            recipient_id = %action.recipient_id,
            count = options.len(),
            "too many choices, keeping the first {MAX_ROWS}"
        );
        options.truncate(MAX_ROWS);
    }
    let rows = options
        .into_iter()
        .map(|(id, title)| {
            check_length(action, "row id", &id, ROW_ID_MAX_LENGTH);
            Row {
                id,
                title: truncate(&title, ROW_TITLE_MAX_LENGTH),
                description: None,
            }
        })
        .collect();
    OutMessage::Interactive {
        interactive: Interactive::List {
            body,
            action: ListAction {
                button: LIST_BUTTON_LABEL.to_string(),
                sections: vec![Section { title: None, rows }],
            },
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn check_length(action: &Action, what: &str, value: &str, max: usize) {
    if value.len() > max {
        warn!(
            recipient_id = %action.recipient_id,
            what,
            length = value.len(),
            max,
            "payload longer than the platform accepts"
        );
    }
}
