// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier check`: prints the validated configuration's connectors.

use std::fmt::Write as _;

use courier_config::model::CourierConfig;

/// Renders a summary of the connectors and paths `serve` would register.
pub fn summary(config: &CourierConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "service {} on {}:{} ({} workers)",
        config.service.name, config.gateway.host, config.gateway.port, config.service.worker_pool_size
    );

    let _ = writeln!(out, "messenger: {} connector(s)", config.messenger.connectors.len());
    for c in &config.messenger.connectors {
        let _ = writeln!(
            out,
            "  {:<16} page {:<18} app {:<18} {}",
            c.connector_id, c.page_id, c.application_id, c.path
        );
    }
    if config.messenger.webhook_check_enabled {
        let _ = writeln!(
            out,
            "  subscription check every {}s",
            config.messenger.webhook_check_period_secs
        );
    }

    let _ = writeln!(out, "whatsapp: {} connector(s)", config.whatsapp.connectors.len());
    for c in &config.whatsapp.connectors {
        let _ = writeln!(
            out,
            "  {:<16} number {:<16} {}",
            c.connector_id, c.phone_number_id, c.path
        );
    }
    if !config.whatsapp.connectors.is_empty() {
        let hashing = if config.whatsapp.hash_user_ids {
            format!("on, ttl {}s", config.whatsapp.hash_ttl_secs)
        } else {
            "off".to_string()
        };
        let _ = writeln!(out, "  user id hashing {hashing}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_connectors() {
        let config = courier_config::load_and_validate_str(
            r#"
[[messenger.connectors]]
connector_id = "shop"
application_id = "A1"
page_id = "P1"
path = "/messenger"
token = "t"
secret = "s"

[[whatsapp.connectors]]
connector_id = "shop-wa"
application_id = "A2"
phone_number_id = "PN1"
path = "/whatsapp"
token = "t"
app_secret = "s"
verify_token = "v"
"#,
        )
        .expect("valid config");

        let text = summary(&config);
        assert!(text.contains("messenger: 1 connector(s)"), "{text}");
        assert!(text.contains("shop"), "{text}");
        assert!(text.contains("number PN1"), "{text}");
        assert!(text.contains("user id hashing on, ttl 3600s"), "{text}");
        assert!(!text.contains("subscription check"), "{text}");
    }
}
