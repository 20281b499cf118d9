// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of a platform connector.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::action::{Action, NotificationType};
use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConnectorType, UserProfile};

/// A connector bound to one platform account (a page or a phone number).
#[async_trait]
pub trait Connector: PluginAdapter {
    /// The configured id of this connector.
    fn connector_id(&self) -> &str;

    /// The platform this connector talks to.
    fn connector_type(&self) -> ConnectorType;

    /// Queues an action for delivery after `delay`.
    ///
    /// Returns immediately. Actions for the same recipient are delivered in
    /// submission order; failures are reported to the controller's `on_error`.
    fn send(&self, action: Action, delay: Duration);

    /// Injects a proactive choice event for `recipient_id` into the controller.
    async fn notify(
        &self,
        recipient_id: &str,
        intent: &str,
        parameters: BTreeMap<String, String>,
        notification_type: Option<NotificationType>,
    ) -> Result<(), CourierError>;

    /// Loads the user's public profile, if the platform exposes one.
    async fn load_profile(&self, _user_id: &str) -> Result<Option<UserProfile>, CourierError> {
        Ok(None)
    }
}
