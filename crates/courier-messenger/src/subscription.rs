// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic check of the page webhook subscriptions.
//!
//! Subscriptions get silently deactivated by the platform (expired tokens,
//! failed deliveries). The checker reads the application subscription and,
//! when it is missing or inactive, subscribes again and refreshes the page's
//! subscribed apps.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::MessengerClient;

/// Fields subscribed when the platform does not report any.
pub const DEFAULT_SUBSCRIPTION_FIELDS: &str =
    "messages,messaging_postbacks,messaging_optins,messaging_account_linking";

/// One page and application to keep subscribed.
#[derive(Clone)]
pub struct SubscriptionTarget {
    pub connector_id: String,
    pub application_id: String,
    pub page_id: String,
    pub token: String,
    pub app_token: String,
    pub verify_token: Option<String>,
}

impl std::fmt::Debug for SubscriptionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionTarget")
            .field("connector_id", &self.connector_id)
            .field("application_id", &self.application_id)
            .field("page_id", &self.page_id)
            .field("token", &"[redacted]")
            .field("app_token", &"[redacted]")
            .finish()
    }
}

/// Outcome of checking one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Active,
    Resubscribed,
    Failed,
}

#[derive(Debug)]
pub struct SubscriptionChecker {
    client: Arc<MessengerClient>,
    targets: Vec<SubscriptionTarget>,
    webhook_url: Option<String>,
}

impl SubscriptionChecker {
    pub fn new(
        client: Arc<MessengerClient>,
        targets: Vec<SubscriptionTarget>,
        webhook_url: Option<String>,
    ) -> Self {
        Self {
            client,
            targets,
            webhook_url,
        }
    }

    /// Checks every target once.
    pub async fn check(&self) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            outcomes.push(self.check_target(target).await);
        }
        outcomes
    }

    async fn check_target(&self, target: &SubscriptionTarget) -> CheckOutcome {
        let Some(subscriptions) = self
            .client
            .subscriptions(&target.application_id, &target.app_token)
            .await
        else {
            return CheckOutcome::Failed;
        };

        let first = subscriptions.data.first();
        if first.is_some_and(|s| s.active) {
            debug!(connector_id = %target.connector_id, "webhook subscription active");
            return CheckOutcome::Active;
        }

        warn!(
            connector_id = %target.connector_id,
            application_id = %target.application_id,
            "webhook subscription missing or inactive, subscribing again"
        );

        let fields = first
            .filter(|s| !s.fields.is_empty())
            .map(|s| {
                s.fields
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_else(|| DEFAULT_SUBSCRIPTION_FIELDS.to_string());
        let callback_url = self
            .webhook_url
            .clone()
            .or_else(|| first.and_then(|s| s.callback_url.clone()))
            .unwrap_or_default();

        let subscribed = self
            .client
            .subscribe(
                &target.application_id,
                &callback_url,
                &fields,
                target.verify_token.as_deref().unwrap_or(""),
                &target.app_token,
            )
            .await;
        if !subscribed.is_some_and(|r| r.success) {
            error!(connector_id = %target.connector_id, "webhook subscription failed");
            return CheckOutcome::Failed;
        }

        self.client
            .delete_subscribed_apps(&target.page_id, &fields, &target.token)
            .await;
        match self
            .client
            .subscribed_apps(&target.page_id, &fields, &target.token)
            .await
        {
            Some(r) if r.success => {
                info!(connector_id = %target.connector_id, fields = %fields, "webhook subscription restored");
                CheckOutcome::Resubscribed
            }
            _ => {
                error!(connector_id = %target.connector_id, "page subscription refresh failed");
                CheckOutcome::Failed
            }
        }
    }

    /// Runs the check every `period` until `cancel` fires. The first check runs immediately.
    pub fn spawn(self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.check().await;
                    }
                    _ = cancel.cancelled() => {
                        info!("webhook subscription check shutting down");
                        break;
                    }
                }
            }
        })
    }
}
