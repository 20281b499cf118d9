// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide table of registered connectors.
//!
//! Each connector id maps to one immutable [`ConnectorRegistration`] holding
//! its credentials and its controller. Several connectors may share a page
//! (one per application); the page index keeps them in registration order.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::CourierError;
use crate::traits::ConnectorController;

/// Everything known about one connector.
#[derive(Clone)]
pub struct ConnectorRegistration {
    pub connector_id: String,
    /// Platform application the connector belongs to.
    pub application_id: String,
    /// Page id (Messenger) or phone number id (WhatsApp).
    pub page_id: String,
    pub token: String,
    pub app_token: Option<String>,
    pub controller: Arc<dyn ConnectorController>,
}

impl std::fmt::Debug for ConnectorRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistration")
            .field("connector_id", &self.connector_id)
            .field("application_id", &self.application_id)
            .field("page_id", &self.page_id)
            .field("token", &"[redacted]")
            .field("app_token", &self.app_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Registry of connectors, shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct ConnectorRegistry {
    connectors: DashMap<String, Arc<ConnectorRegistration>>,
    pages: DashMap<String, Vec<String>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector, replacing any previous registration with the same id.
    pub fn register(&self, registration: ConnectorRegistration) -> Arc<ConnectorRegistration> {
        let registration = Arc::new(registration);
        let id = registration.connector_id.clone();
        if let Some(previous) = self
            .connectors
            .insert(id.clone(), Arc::clone(&registration))
        {
            self.unlink_page(&previous.page_id, &id);
        }
        self.pages
            .entry(registration.page_id.clone())
            .or_default()
            .push(id.clone());
        info!(
            connector_id = %id,
            application_id = %registration.application_id,
            page_id = %registration.page_id,
            "connector registered"
        );
        registration
    }

    /// Removes a connector. Returns the removed registration, if any.
    ///
    /// The page link goes first so page lookups never meet a dangling id.
    pub fn unregister(&self, connector_id: &str) -> Option<Arc<ConnectorRegistration>> {
        let page_id = self.connectors.get(connector_id)?.page_id.clone();
        self.unlink_page(&page_id, connector_id);
        let (_, removed) = self.connectors.remove(connector_id)?;
        info!(connector_id, "connector unregistered");
        Some(removed)
    }

    pub fn by_connector(&self, connector_id: &str) -> Option<Arc<ConnectorRegistration>> {
        self.connectors.get(connector_id).map(|r| Arc::clone(&r))
    }

    /// First connector registered for `page_id`.
    ///
    /// Falls back to a connector whose application id equals `page_id`, for
    /// deployments that configured the application id in place of the page id.
    pub fn by_page(&self, page_id: &str) -> Option<Arc<ConnectorRegistration>> {
        let first = self.first_of_page(page_id);
        if first.is_some() {
            return first;
        }
        let legacy = self.find_by_application(page_id);
        if legacy.is_some() {
            warn!(page_id, "page not found, using connector with this application id");
        }
        legacy
    }

    /// Resolves the connector receiving a callback for `page_id` on the
    /// endpoint of `application_id`.
    ///
    /// The connector of that page belonging to the application wins;
    /// otherwise the endpoint's default connector is used.
    pub fn route(
        &self,
        page_id: &str,
        application_id: &str,
        default_connector_id: &str,
    ) -> Option<Arc<ConnectorRegistration>> {
        let matching = self.pages.get(page_id).and_then(|ids| {
            ids.iter()
                .filter_map(|id| self.connectors.get(id).map(|r| Arc::clone(&r)))
                .find(|r| r.application_id == application_id)
        });
        if matching.is_some() {
            return matching;
        }
        warn!(
            page_id,
            application_id,
            default_connector_id,
            "no connector for page and application, using default connector"
        );
        self.by_connector(default_connector_id)
    }

    /// Resolves the token used to call the platform on behalf of `id`.
    ///
    /// `id` is tried as a connector id, then as a page id (first connector of
    /// the page), then as an application id (its app token).
    pub fn token_for(&self, id: &str) -> Result<String, CourierError> {
        if let Some(registration) = self.connectors.get(id) {
            return Ok(registration.token.clone());
        }
        if let Some(registration) = self.first_of_page(id) {
            warn!(
                page_id = id,
                connector_id = %registration.connector_id,
                "token requested by page id, using first connector of the page"
            );
            return Ok(registration.token.clone());
        }
        if let Some(app_token) = self
            .find_by_application(id)
            .and_then(|r| r.app_token.clone())
        {
            return Ok(app_token);
        }
        Err(CourierError::NotFound {
            kind: "token for connector",
            id: id.to_string(),
        })
    }

    pub fn controller_for(
        &self,
        connector_id: &str,
    ) -> Result<Arc<dyn ConnectorController>, CourierError> {
        self.by_connector(connector_id)
            .map(|r| Arc::clone(&r.controller))
            .ok_or_else(|| CourierError::NotFound {
                kind: "connector",
                id: connector_id.to_string(),
            })
    }

    /// Registered connector ids, sorted.
    pub fn connector_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.connectors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    fn find_by_application(&self, application_id: &str) -> Option<Arc<ConnectorRegistration>> {
        self.connectors
            .iter()
            .find(|e| e.application_id == application_id)
            .map(|e| Arc::clone(e.value()))
    }

    /// First registered connector of the page that is still live.
    fn first_of_page(&self, page_id: &str) -> Option<Arc<ConnectorRegistration>> {
        let ids = self.pages.get(page_id)?.value().clone();
        ids.iter().find_map(|id| self.by_connector(id))
    }

    fn unlink_page(&self, page_id: &str, connector_id: &str) {
        if let Some(mut ids) = self.pages.get_mut(page_id) {
            ids.retain(|id| id != connector_id);
        }
        self.pages.remove_if(page_id, |_, ids| ids.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::event::Event;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl ConnectorController for Noop {
        async fn handle(&self, _event: Event) -> Result<(), CourierError> {
            Ok(())
        }
        fn on_error(&self, _action: &Action, _error: &CourierError) {}
    }

    fn registration(connector: &str, app: &str, page: &str) -> ConnectorRegistration {
        ConnectorRegistration {
            connector_id: connector.into(),
            application_id: app.into(),
            page_id: page.into(),
            token: format!("token-{connector}"),
            app_token: Some(format!("app-token-{app}")),
            controller: Arc::new(Noop),
        }
    }

    /// appA serves pages A, B, C; appB serves pages A and B.
    fn five_connectors() -> ConnectorRegistry {
        let registry = ConnectorRegistry::new();
        registry.register(registration("connectorId1", "appA", "pageA"));
        registry.register(registration("connectorId2", "appA", "pageB"));
        registry.register(registration("connectorId3", "appA", "pageC"));
        registry.register(registration("connectorId4", "appB", "pageA"));
        registry.register(registration("connectorId5", "appB", "pageB"));
        registry
    }

    #[test]
    fn route_picks_connector_of_the_application() {
        let registry = five_connectors();
        let r = registry.route("pageA", "appB", "connectorId4").unwrap();
        assert_eq!(r.connector_id, "connectorId4");
        let r = registry.route("pageB", "appA", "connectorId1").unwrap();
        assert_eq!(r.connector_id, "connectorId2");
        let r = registry.route("pageB", "appB", "connectorId4").unwrap();
        assert_eq!(r.connector_id, "connectorId5");
    }

    #[tracing_test::traced_test]
    #[test]
    fn route_falls_back_to_default() {
        let registry = five_connectors();
        let r = registry.route("pageC", "appB", "connectorId4").unwrap();
        assert_eq!(r.connector_id, "connectorId4");
        assert!(logs_contain("using default connector"));
    }

    #[test]
    fn token_resolution_order() {
        let registry = five_connectors();
        assert_eq!(registry.token_for("connectorId3").unwrap(), "token-connectorId3");
        // Page id: first connector registered for the page.
        assert_eq!(registry.token_for("pageA").unwrap(), "token-connectorId1");
        // Application id: the app token.
        assert_eq!(registry.token_for("appB").unwrap(), "app-token-appB");

        let err = registry.token_for("unknown").unwrap_err();
        assert!(matches!(err, CourierError::NotFound { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn by_page_falls_back_to_application_id() {
        let registry = ConnectorRegistry::new();
        registry.register(registration("c1", "legacy-app", "real-page"));
        assert_eq!(registry.by_page("real-page").unwrap().connector_id, "c1");
        assert_eq!(registry.by_page("legacy-app").unwrap().connector_id, "c1");
        assert!(registry.by_page("nothing").is_none());
    }

    #[test]
    fn unregister_removes_token_and_controller_together() {
        let registry = five_connectors();
        assert!(registry.unregister("connectorId1").is_some());
        assert!(registry.by_connector("connectorId1").is_none());
        assert!(registry.controller_for("connectorId1").is_err());
        // pageA now resolves to the remaining connector.
        assert_eq!(registry.token_for("pageA").unwrap(), "token-connectorId4");
        assert!(registry.unregister("connectorId1").is_none());
        assert_eq!(registry.len(), 4);
    }

    // ---- A page link without its connector is skipped, not fatal ----
    #[test]
    fn page_lookups_skip_dangling_ids() {
        let registry = five_connectors();
        // State seen mid-removal if the connector went before its page link.
        registry.connectors.remove("connectorId1");
        assert_eq!(registry.by_page("pageA").unwrap().connector_id, "connectorId4");
        assert_eq!(registry.token_for("pageA").unwrap(), "token-connectorId4");

        registry.unregister("connectorId4");
        assert!(registry.pages.get("pageA").is_some_and(|ids| ids.value() == &["connectorId1"]));
        assert!(registry.by_page("pageA").is_none());
    }

    #[test]
    fn unregister_unlinks_page() {
        let registry = five_connectors();
        registry.unregister("connectorId3");
        assert!(registry.pages.get("pageC").is_none());
        assert!(registry.by_page("pageC").is_none());
    }

    #[test]
    fn reregistering_moves_page() {
        let registry = ConnectorRegistry::new();
        registry.register(registration("c1", "app", "p1"));
        registry.register(registration("c1", "app", "p2"));
        assert!(registry.by_page("p1").is_none());
        assert_eq!(registry.by_page("p2").unwrap().connector_id, "c1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", registration("c1", "app", "p1"));
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("token-c1"));
    }
}
