// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! non-empty credentials, unique connector ids, well-formed webhook paths.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.gateway.host.trim().is_empty() {
        errors.push(invalid("gateway.host must not be empty"));
    }

    if config.service.worker_pool_size < 1 {
        errors.push(invalid("service.worker_pool_size must be at least 1"));
    }

    if config.delivery.lane_idle_timeout_secs == 0 {
        errors.push(invalid("delivery.lane_idle_timeout_secs must be at least 1"));
    }

    if config.messenger.request_timeout_ms == 0 {
        errors.push(invalid("messenger.request_timeout_ms must be at least 1"));
    }

    if config.messenger.webhook_check_enabled && config.messenger.webhook_check_period_secs == 0 {
        errors.push(invalid(
            "messenger.webhook_check_period_secs must be at least 1 when the check is enabled",
        ));
    }

    // Connector ids are unique across platforms: they key the shared registry.
    let mut seen_ids = HashSet::new();
    let ids = config
        .messenger
        .connectors
        .iter()
        .map(|c| c.connector_id.as_str())
        .chain(config.whatsapp.connectors.iter().map(|c| c.connector_id.as_str()));
    for id in ids {
        if id.trim().is_empty() {
            errors.push(invalid("connector_id must not be empty"));
        } else if !seen_ids.insert(id) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate connector id `{id}`"),
            });
        }
    }

    for (i, connector) in config.messenger.connectors.iter().enumerate() {
        let at = format!("messenger.connectors[{i}]");
        check_path(&mut errors, &at, &connector.path);
        check_not_empty(&mut errors, &at, "application_id", &connector.application_id);
        check_not_empty(&mut errors, &at, "page_id", &connector.page_id);
        check_not_empty(&mut errors, &at, "token", &connector.token);
        check_not_empty(&mut errors, &at, "secret", &connector.secret);
    }

    // Connectors sharing a path answer the same handshake and signature check.
    let mut path_apps: Vec<(&str, &str)> = Vec::new();
    for connector in &config.messenger.connectors {
        match path_apps.iter().find(|(path, _)| *path == connector.path) {
            Some((_, app)) if *app != connector.application_id => {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "messenger path `{}` is shared by applications `{app}` and `{}`",
                        connector.path, connector.application_id
                    ),
                });
            }
            Some(_) => {}
            None => path_apps.push((&connector.path, &connector.application_id)),
        }
    }

    let mut whatsapp_paths = HashSet::new();
    for (i, connector) in config.whatsapp.connectors.iter().enumerate() {
        let at = format!("whatsapp.connectors[{i}]");
        check_path(&mut errors, &at, &connector.path);
        check_not_empty(&mut errors, &at, "phone_number_id", &connector.phone_number_id);
        check_not_empty(&mut errors, &at, "token", &connector.token);
        check_not_empty(&mut errors, &at, "app_secret", &connector.app_secret);
        check_not_empty(&mut errors, &at, "verify_token", &connector.verify_token);
        check_not_empty(&mut errors, &at, "mode", &connector.mode);
        if !whatsapp_paths.insert(connector.path.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("{at}.path `{}` is already used by another connector", connector.path),
            });
        }
    }

    for path in &whatsapp_paths {
        if config.messenger.connectors.iter().any(|c| c.path == *path) {
            errors.push(ConfigError::Validation {
                message: format!("webhook path `{path}` is used by both messenger and whatsapp"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

fn check_not_empty(errors: &mut Vec<ConfigError>, at: &str, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: format!("{at}.{field} must not be empty"),
        });
    }
}

fn check_path(errors: &mut Vec<ConfigError>, at: &str, path: &str) {
    if !path.starts_with('/') {
        errors.push(ConfigError::Validation {
            message: format!("{at}.path `{path}` must start with `/`"),
        });
    } else if matches!(path, "/health" | "/metrics") {
        errors.push(ConfigError::Validation {
            message: format!("{at}.path `{path}` is reserved by the gateway"),
        });
    }
}
