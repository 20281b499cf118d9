// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Controller used when no bot engine is attached: logs what it receives.

use async_trait::async_trait;
use tracing::{info, warn};

use courier_core::{Action, ConnectorController, CourierError, Event};

#[derive(Debug, Default)]
pub struct LogController;

#[async_trait]
impl ConnectorController for LogController {
    async fn handle(&self, event: Event) -> Result<(), CourierError> {
        info!(
            connector_id = %event.application_id,
            sender_id = %event.sender_id,
            kind = event.kind_name(),
            notification = event.notification,
            "event received"
        );
        Ok(())
    }

    fn on_error(&self, action: &Action, error: &CourierError) {
        warn!(
            connector_id = %action.application_id,
            recipient_id = %action.recipient_id,
            action = action.kind_name(),
            error = %error,
            "action not delivered"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::EventKind;

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn logs_events_and_failures() {
        let controller = LogController;
        let event = Event::new(
            "U1",
            "P1",
            "c1",
            EventKind::Sentence {
                text: "hello".into(),
            },
        );
        controller.handle(event).await.unwrap();
        controller.on_error(
            &Action::text("U1", "c1", "hi"),
            &CourierError::connector("blocked"),
        );
        assert!(logs_contain("event received"));
        assert!(logs_contain("action not delivered"));
    }
}
