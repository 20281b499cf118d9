// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps inbound Cloud API messages onto platform-neutral events.

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::choice::{NLP_PARAMETER, decode_choice_id};
use courier_core::{AttachmentKind, CourierError, Event, EventKind};

use crate::webhook::{InboundMessage, Media, MessageType};

/// Resolves an inbound media id to a download URL.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn media_url(&self, media_id: &str) -> Result<String, CourierError>;
}

/// Converts `message` into an event.
///
/// `sender_id` is the id shown to the bot (the hashed number when hashing is
/// on). Returns `None` for unsupported types and for media whose URL cannot
/// be resolved.
pub async fn to_event(
    message: &InboundMessage,
    sender_id: &str,
    phone_number_id: &str,
    connector_id: &str,
    media: &dyn MediaResolver,
) -> Option<Event> {
    let kind = match message.kind {
        MessageType::Text => EventKind::Sentence {
            text: message.text.as_ref()?.body.clone(),
        },
        MessageType::Interactive => choice(message.interactive.as_ref()?.selected_id()?),
        MessageType::Button => {
            let button = message.button.as_ref()?;
            match button.payload.as_deref() {
                Some(payload) => choice(payload),
                None => EventKind::Sentence {
                    text: button.text.clone(),
                },
            }
        }
        MessageType::Image => attachment(message.image.as_ref()?, AttachmentKind::Image, media).await?,
        MessageType::Audio => attachment(message.audio.as_ref()?, AttachmentKind::Audio, media).await?,
        MessageType::Video => attachment(message.video.as_ref()?, AttachmentKind::Video, media).await?,
        MessageType::Document => {
            attachment(message.document.as_ref()?, AttachmentKind::File, media).await?
        }
        MessageType::Location => {
            let location = message.location.as_ref()?;
            EventKind::Location {
                latitude: location.latitude,
                longitude: location.longitude,
            }
        }
        MessageType::Unsupported => {
            debug!(message_id = %message.id, "unsupported message type");
            return None;
        }
    };

    Some(
        Event::new(sender_id, phone_number_id, connector_id, kind)
            .with_correlation_id(Some(message.id.clone())),
    )
}

fn choice(payload: &str) -> EventKind {
    let (intent, mut parameters) = decode_choice_id(payload);
    match parameters.remove(NLP_PARAMETER) {
        Some(text) => EventKind::Sentence { text },
        None => EventKind::Choice { intent, parameters },
    }
}

async fn attachment(
    item: &Media,
    kind: AttachmentKind,
    media: &dyn MediaResolver,
) -> Option<EventKind> {
    match media.media_url(&item.id).await {
        Ok(url) => Some(EventKind::Attachment { url, kind }),
        Err(e) => {
            warn!(media_id = %item.id, error = %e, "media url unavailable, message skipped");
            None
        }
    }
}
