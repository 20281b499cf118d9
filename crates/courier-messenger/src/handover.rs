// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread ownership when several applications share one page.
//!
//! The controller keeps a local ledger of thread owners per user, updated
//! by the three handover verbs and by inbound handover webhooks. No entry
//! means the owner is unknown, and the platform is asked.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use courier_core::{Event, EventKind};

use crate::client::MessengerClient;
use crate::types::{
    PassThreadControlRequest, Recipient, SecondaryReceiver, ThreadControlRequest,
};

/// Handover state of the page bound to one connector.
pub struct HandoverController {
    client: Arc<MessengerClient>,
    token: String,
    own_app_id: String,
    owners: DashMap<String, String>,
}

impl std::fmt::Debug for HandoverController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoverController")
            .field("own_app_id", &self.own_app_id)
            .field("token", &"[redacted]")
            .field("owners", &self.owners.len())
            .finish()
    }
}

impl HandoverController {
    pub fn new(
        client: Arc<MessengerClient>,
        token: impl Into<String>,
        own_app_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token: token.into(),
            own_app_id: own_app_id.into(),
            owners: DashMap::new(),
        }
    }

    /// Asks the primary receiver for control of the thread. The ledger is unchanged.
    pub async fn request_thread_control(&self, user_id: &str, metadata: Option<String>) -> bool {
        let request = ThreadControlRequest {
            recipient: Recipient::id(user_id),
            metadata,
        };
        match self.client.request_thread_control(&self.token, &request).await {
            Some(_) => true,
            None => {
                self.forget(user_id);
                false
            }
        }
    }

    /// Passes the thread to `target_app_id`.
    pub async fn pass_thread_control(
        &self,
        user_id: &str,
        target_app_id: &str,
        metadata: Option<String>,
    ) -> bool {
        let request = PassThreadControlRequest {
            recipient: Recipient::id(user_id),
            target_app_id: target_app_id.to_string(),
            metadata,
        };
        match self.client.pass_thread_control(&self.token, &request).await {
            Some(_) => {
                info!(user_id, target_app_id, "thread control passed");
                self.owners
                    .insert(user_id.to_string(), target_app_id.to_string());
                true
            }
            None => {
                self.forget(user_id);
                false
            }
        }
    }

    /// Takes the thread back for this application.
    pub async fn take_thread_control(&self, user_id: &str, metadata: Option<String>) -> bool {
        let request = ThreadControlRequest {
            recipient: Recipient::id(user_id),
            metadata,
        };
        match self.client.take_thread_control(&self.token, &request).await {
            Some(_) => {
                info!(user_id, "thread control taken");
                self.owners
                    .insert(user_id.to_string(), self.own_app_id.clone());
                true
            }
            None => {
                self.forget(user_id);
                false
            }
        }
    }

    /// Current owner of the thread: the ledger first, then the platform.
    pub async fn thread_owner(&self, user_id: &str) -> Option<String> {
        if let Some(owner) = self.owners.get(user_id) {
            return Some(owner.clone());
        }
        let owner = self.client.thread_owner(&self.token, user_id).await?;
        self.owners.insert(user_id.to_string(), owner.clone());
        Some(owner)
    }

    pub async fn secondary_receivers(&self) -> Option<Vec<SecondaryReceiver>> {
        self.client.secondary_receivers(&self.token).await
    }

    /// Applies an inbound handover webhook to the ledger.
    pub fn observe(&self, event: &Event) {
        match &event.kind {
            EventKind::PassThreadControl {
                new_owner_app_id, ..
            } => {
                debug!(user_id = %event.sender_id, new_owner_app_id, "thread passed");
                self.owners
                    .insert(event.sender_id.clone(), new_owner_app_id.clone());
            }
            EventKind::TakeThreadControl { .. } => {
                // The taking application is not named in the webhook.
                debug!(user_id = %event.sender_id, "thread taken");
                self.forget(&event.sender_id);
            }
            _ => {}
        }
    }

    /// Ledger entry for `user_id`, without asking the platform.
    pub fn known_owner(&self, user_id: &str) -> Option<String> {
        self.owners.get(user_id).map(|o| o.clone())
    }

    fn forget(&self, user_id: &str) {
        if self.owners.remove(user_id).is_some() {
            warn!(user_id, "thread owner unknown after failed handover call");
        }
    }
}
