// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier connector layer.

use thiserror::Error;

/// The primary error type used across connectors, clients, and core operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing credentials, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A platform API call failed (non-2xx answer, transport error, retries exhausted).
    #[error("connector error: {message}")]
    Connector {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An inbound payload could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An unknown connector, page, credential, or identifier was requested.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A short-lived identifier has expired and can no longer be resolved.
    #[error("{kind} {id} has expired")]
    Expired { kind: &'static str, id: String },

    /// Platform health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Shorthand for a platform failure carrying only the platform's message.
    pub fn connector(message: impl Into<String>) -> Self {
        Self::Connector {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a failed decode of an inbound payload.
    pub fn decode(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

