// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure policy of every Send API call kind.

use tracing::{debug, error, info, warn};

use courier_core::CourierError;

use crate::types::GraphError;

/// The Graph API calls made by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Message,
    AttachmentUpload,
    SenderAction,
    ThreadControl,
    ThreadOwner,
    SecondaryReceivers,
    UserProfile,
    Subscription,
    CustomEvent,
}

/// What happens when a call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the error to the caller; `retry` enables the transient-error retry.
    Propagate { retry: bool },
    /// Log and continue without a result.
    LogAndNone,
    /// Log and continue with a default value.
    LogAndDefault,
}

impl CallKind {
    pub const fn policy(self) -> FailurePolicy {
        match self {
            CallKind::Message => FailurePolicy::Propagate { retry: true },
            CallKind::AttachmentUpload | CallKind::CustomEvent => {
                FailurePolicy::Propagate { retry: false }
            }
            CallKind::SenderAction
            | CallKind::ThreadControl
            | CallKind::ThreadOwner
            | CallKind::SecondaryReceivers
            | CallKind::Subscription => FailurePolicy::LogAndNone,
            CallKind::UserProfile => FailurePolicy::LogAndDefault,
        }
    }

    /// Request timer name.
    pub const fn timer_name(self) -> &'static str {
        match self {
            CallKind::Message => "messenger_send_message",
            CallKind::AttachmentUpload => "messenger_send_attachment",
            CallKind::SenderAction => "messenger_send_action",
            CallKind::ThreadControl => "messenger_send_thread_control",
            CallKind::ThreadOwner => "messenger_send_thread_owner",
            CallKind::SecondaryReceivers => "messenger_send_secondary_receivers",
            CallKind::UserProfile => "messenger_send_user_profile",
            CallKind::Subscription => "messenger_send_subscription",
            CallKind::CustomEvent => "messenger_send_custom_event",
        }
    }

    pub const fn retries(self) -> bool {
        matches!(self.policy(), FailurePolicy::Propagate { retry: true })
    }

    /// Sender actions fail routinely (blocked users), so their errors stay at debug.
    pub(crate) fn log_platform_error(self, status: u16, body: &str) {
        if self == CallKind::SenderAction {
            debug!(call = ?self, status, body, "messenger error");
        } else {
            warn!(call = ?self, status, body, "messenger error");
        }
    }

    /// Applies a non-propagating policy: logs the error and drops it.
    pub(crate) fn absorb<T>(self, result: Result<T, CourierError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                match self {
                    CallKind::SenderAction => info!(call = ?self, error = %e, "ignored messenger failure"),
                    CallKind::ThreadOwner | CallKind::SecondaryReceivers | CallKind::UserProfile => {
                        warn!(call = ?self, error = %e, "ignored messenger failure")
                    }
                    _ => error!(call = ?self, error = %e, "ignored messenger failure"),
                }
                None
            }
        }
    }
}

/// Errors worth retrying a message send for.
///
/// 1200 is a temporary send failure, 613 a rate limit, and 200/1545041 a
/// recipient that is momentarily unavailable.
pub fn is_transient(error: &GraphError) -> bool {
    matches!(
        (error.code, error.error_subcode),
        (Some(1200), _) | (Some(613), _) | (Some(200), Some(1545041))
    )
}
