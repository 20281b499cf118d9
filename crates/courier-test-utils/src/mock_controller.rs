// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock bot engine for deterministic testing.
//!
//! `MockController` implements `ConnectorController`, capturing every event
//! handed to it and every delivery error reported through `on_error`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use courier_core::{Action, ConnectorController, CourierError, Event};

/// A delivery failure reported to the controller.
#[derive(Debug, Clone)]
pub struct RecordedError {
    pub action: Action,
    pub message: String,
}

/// A recording controller.
///
/// Provides two logs:
/// - **events**: everything passed to `handle()`, in arrival order
/// - **errors**: every `on_error()` call, with the error rendered as text
#[derive(Debug, Default)]
pub struct MockController {
    events: Mutex<Vec<Event>>,
    errors: Mutex<Vec<RecordedError>>,
    notify: Notify,
    fail_handle: bool,
}

impl MockController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A controller whose `handle()` records the event, then fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_handle: true,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn errors(&self) -> Vec<RecordedError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until at least `count` events were handled, or `timeout` elapses.
    ///
    /// Returns the events seen so far either way.
    pub async fn wait_for_events(&self, count: usize, timeout: Duration) -> Vec<Event> {
        let _ = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.events.lock().unwrap_or_else(PoisonError::into_inner).len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        self.events()
    }

    /// Waits until at least `count` errors were reported, or `timeout` elapses.
    pub async fn wait_for_errors(&self, count: usize, timeout: Duration) -> Vec<RecordedError> {
        let _ = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.errors.lock().unwrap_or_else(PoisonError::into_inner).len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        self.errors()
    }
}

#[async_trait]
impl ConnectorController for MockController {
    async fn handle(&self, event: Event) -> Result<(), CourierError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        self.notify.notify_waiters();
        if self.fail_handle {
            return Err(CourierError::Internal("mock controller failure".into()));
        }
        Ok(())
    }

    fn on_error(&self, action: &Action, error: &CourierError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedError {
                action: action.clone(),
                message: error.to_string(),
            });
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::EventKind;

    fn sentence(text: &str) -> Event {
        Event::new(
            "U1",
            "P1",
            "c1",
            EventKind::Sentence {
                text: text.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn handle_records_events_in_order() {
        let controller = MockController::new();
        controller.handle(sentence("first")).await.unwrap();
        controller.handle(sentence("second")).await.unwrap();

        let events = controller.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].kind,
            EventKind::Sentence {
                text: "second".into()
            }
        );
    }

    #[tokio::test]
    async fn failing_controller_still_records() {
        let controller = MockController::failing();
        assert!(controller.handle(sentence("hi")).await.is_err());
        assert_eq!(controller.events().len(), 1);
    }

    #[tokio::test]
    async fn on_error_records_message() {
        let controller = MockController::new();
        let action = Action::text("U1", "c1", "hello");
        controller.on_error(&action, &CourierError::connector("blocked"));

        let errors = controller.errors();
        assert_eq!(errors[0].action, action);
        assert_eq!(errors[0].message, "connector error: blocked");
    }

    #[tokio::test]
    async fn wait_for_events_wakes_on_handle() {
        let controller = MockController::new();
        let clone = Arc::clone(&controller);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            clone.handle(sentence("delayed")).await.unwrap();
        });

        let events = controller
            .wait_for_events(1, Duration::from_secs(2))
            .await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn wait_for_events_times_out() {
        let controller = MockController::new();
        let events = controller
            .wait_for_events(1, Duration::from_millis(20))
            .await;
        assert!(events.is_empty());
    }
}
