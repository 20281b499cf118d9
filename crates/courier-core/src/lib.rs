// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier connector layer.
//!
//! This crate provides the platform-neutral event and action model, the
//! connector traits, and the shared machinery every connector builds on:
//! webhook signatures, the per-recipient delivery queue, the attachment
//! cache, the connector registry, and request telemetry.

pub mod action;
pub mod cache;
pub mod choice;
pub mod error;
pub mod event;
pub mod queue;
pub mod registry;
pub mod signature;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use action::{Action, ActionKind, ActionMetadata, AttachmentSource, Choice, NotificationType};
pub use cache::AttachmentCache;
pub use error::CourierError;
pub use event::{AppRole, AttachmentKind, Event, EventKind};
pub use queue::{DeliveryQueue, Transmitter};
pub use registry::{ConnectorRegistration, ConnectorRegistry};
pub use signature::SignatureAlgorithm;
pub use telemetry::RequestTimer;
pub use types::{AdapterType, ConnectorType, HealthStatus, UserProfile};

pub use traits::{
    ChallengeQuery, Connector, ConnectorController, INVALID_VERIFY_TOKEN, PluginAdapter,
    WebhookEndpoint,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_error_has_all_variants() {
        let _config = CourierError::Config("test".into());
        let _connector = CourierError::connector("test");
        let _decode = CourierError::Decode {
            message: "test".into(),
            source: None,
        };
        let _not_found = CourierError::NotFound {
            kind: "connector",
            id: "c1".into(),
        };
        let _expired = CourierError::Expired {
            kind: "hashed id",
            id: "abc".into(),
        };
        let _health = CourierError::HealthCheckFailed {
            name: "test".into(),
            source: Box::new(std::io::Error::other("test")),
        };
        let _timeout = CourierError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = CourierError::Internal("test".into());
    }

    #[test]
    fn connector_type_round_trips_through_strum() {
        use std::str::FromStr;

        for variant in [ConnectorType::Messenger, ConnectorType::WhatsappCloud] {
            let s = variant.to_string();
            let parsed = ConnectorType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
        assert_eq!(ConnectorType::WhatsappCloud.to_string(), "whatsapp_cloud");
    }

    #[test]
    fn not_found_message() {
        let err = CourierError::NotFound {
            kind: "connector",
            id: "c9".into(),
        };
        assert_eq!(err.to_string(), "connector c9 not found");
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_connector<T: Connector>() {}
        fn _assert_controller<T: ConnectorController>() {}
        fn _assert_endpoint<T: WebhookEndpoint>() {}
    }
}
