// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams between connectors, the gateway, and the bot engine.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod connector;
pub mod controller;
pub mod endpoint;

pub use adapter::PluginAdapter;
pub use connector::Connector;
pub use controller::ConnectorController;
pub use endpoint::{ChallengeQuery, INVALID_VERIFY_TOKEN, WebhookEndpoint};
