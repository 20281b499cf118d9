// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bot engine as seen from a connector.

use async_trait::async_trait;

use crate::action::Action;
use crate::error::CourierError;
use crate::event::Event;

/// Receives normalized events and delivery failures for one connector.
///
/// Implemented by the bot engine. `handle` is called once per normalized
/// event, in the order the platform delivered them within a batch.
#[async_trait]
pub trait ConnectorController: Send + Sync + 'static {
    /// Handles an inbound event.
    async fn handle(&self, event: Event) -> Result<(), CourierError>;

    /// Called when an action could not be delivered.
    fn on_error(&self, action: &Action, error: &CourierError);
}
