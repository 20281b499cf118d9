// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Messenger Send and Graph APIs.
//!
//! Every call goes through [`MessengerClient::execute`], which times the
//! request, decodes Graph API errors, and retries message sends on transient
//! errors. What a failure means for the caller is decided per call kind in
//! [`crate::policy`].

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use courier_config::model::MessengerConfig;
use courier_core::{CourierError, RequestTimer, UserProfile};

use crate::policy::{CallKind, is_transient};
use crate::types::{
    ActionRequest, AttachmentRequest, CustomEventRequest, ErrorContainer, MessageRequest,
    OutAttachmentType, PassThreadControlRequest, SecondaryReceiver, SecondaryReceiversResponse,
    SendResponse, SubscriptionsResponse, SuccessResponse, ThreadControlRequest,
    ThreadOwnerResponse,
};

const STANDARD_PROFILE_FIELDS: &str = "first_name,last_name,profile_pic";

/// Client for one Graph API base URL, shared by all Messenger connectors.
#[derive(Debug, Clone)]
pub struct MessengerClient {
    http: reqwest::Client,
    base_url: String,
    status_url: String,
    retry_limit: u32,
    retry_wait: Duration,
    extended_profile_fields: String,
}

impl MessengerClient {
    pub fn new(config: &MessengerConfig) -> Result<Self, CourierError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CourierError::Connector {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            status_url: config.status_url.clone(),
            retry_limit: config.retry_limit,
            retry_wait: Duration::from_millis(config.retry_wait_ms),
            extended_profile_fields: config.extended_profile_fields.clone(),
        })
    }

    /// Overrides the base URL (used by tests against a mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the status page URL.
    pub fn with_status_url(mut self, url: impl Into<String>) -> Self {
        self.status_url = url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a message, retrying transient errors up to the configured limit.
    pub async fn send_message(
        &self,
        token: &str,
        request: &MessageRequest,
    ) -> Result<SendResponse, CourierError> {
        let url = self.url("me/messages");
        self.execute(CallKind::Message, || {
            self.http
                .post(&url)
                .query(&[("access_token", token)])
                .json(request)
        })
        .await
    }

    /// Uploads a reusable attachment from a URL, returning its attachment id.
    pub async fn send_attachment(
        &self,
        token: &str,
        request: &AttachmentRequest,
    ) -> Result<SendResponse, CourierError> {
        let url = self.url("me/message_attachments");
        self.execute(CallKind::AttachmentUpload, || {
            self.http
                .post(&url)
                .query(&[("access_token", token)])
                .json(request)
        })
        .await
    }

    /// Uploads attachment bytes as multipart form data.
    pub async fn upload_attachment(
        &self,
        token: &str,
        kind: OutAttachmentType,
        bytes: &[u8],
        mime_type: &str,
        file_name: &str,
    ) -> Result<SendResponse, CourierError> {
        let url = self.url("me/message_attachments");
        let message = serde_json::json!({
            "attachment": {"type": kind, "payload": {"is_reusable": true}}
        })
        .to_string();
        self.execute(CallKind::AttachmentUpload, || {
            let part = Part::bytes(bytes.to_vec())
                .file_name(file_name.to_string())
                .mime_str(mime_type)
                .unwrap_or_else(|_| Part::bytes(bytes.to_vec()).file_name(file_name.to_string()));
            let form = Form::new()
                .text("message", message.clone())
                .part("filedata", part);
            self.http
                .post(&url)
                .query(&[("access_token", token)])
                .multipart(form)
        })
        .await
    }

    /// Sends `typing_on`, `typing_off` or `mark_seen`.
    pub async fn send_action(&self, token: &str, request: &ActionRequest) -> Option<SendResponse> {
        let url = self.url("me/messages");
        let result = self
            .execute(CallKind::SenderAction, || {
                self.http
                    .post(&url)
                    .query(&[("access_token", token)])
                    .json(request)
            })
            .await;
        CallKind::SenderAction.absorb(result)
    }

    pub async fn pass_thread_control(
        &self,
        token: &str,
        request: &PassThreadControlRequest,
    ) -> Option<SendResponse> {
        self.thread_control("me/pass_thread_control", token, request).await
    }

    pub async fn take_thread_control(
        &self,
        token: &str,
        request: &ThreadControlRequest,
    ) -> Option<SendResponse> {
        self.thread_control("me/take_thread_control", token, request).await
    }

    pub async fn request_thread_control(
        &self,
        token: &str,
        request: &ThreadControlRequest,
    ) -> Option<SendResponse> {
        self.thread_control("me/request_thread_control", token, request).await
    }

    async fn thread_control<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Option<SendResponse> {
        let url = self.url(path);
        let result = self
            .execute(CallKind::ThreadControl, || {
                self.http
                    .post(&url)
                    .query(&[("access_token", token)])
                    .json(body)
            })
            .await;
        CallKind::ThreadControl.absorb(result)
    }

    /// App id currently owning the thread with `user_id`.
    pub async fn thread_owner(&self, token: &str, user_id: &str) -> Option<String> {
        let url = self.url("me/thread_owner");
        let result: Result<ThreadOwnerResponse, _> = self
            .execute(CallKind::ThreadOwner, || {
                self.http
                    .get(&url)
                    .query(&[("access_token", token), ("recipient", user_id)])
            })
            .await;
        CallKind::ThreadOwner
            .absorb(result)?
            .data
            .into_iter()
            .next()
            .map(|d| d.thread_owner.app_id)
    }

    /// Secondary receivers of the page; only answered for the primary receiver.
    pub async fn secondary_receivers(&self, token: &str) -> Option<Vec<SecondaryReceiver>> {
        let url = self.url("me/secondary_receivers");
        let result: Result<SecondaryReceiversResponse, _> = self
            .execute(CallKind::SecondaryReceivers, || {
                self.http
                    .get(&url)
                    .query(&[("access_token", token), ("fields", "id,name")])
            })
            .await;
        CallKind::SecondaryReceivers.absorb(result).map(|r| r.data)
    }

    /// Public profile of `user_id`; an empty profile when the platform refuses.
    pub async fn user_profile(&self, token: &str, user_id: &str) -> UserProfile {
        let url = self.url(user_id);
        let fields = self.profile_fields();
        let result = self
            .execute(CallKind::UserProfile, || {
                self.http
                    .get(&url)
                    .query(&[("access_token", token), ("fields", fields.as_str())])
            })
            .await;
        CallKind::UserProfile.absorb(result).unwrap_or_default()
    }

    fn profile_fields(&self) -> String {
        if self.extended_profile_fields.is_empty() {
            STANDARD_PROFILE_FIELDS.to_string()
        } else {
            format!("{STANDARD_PROFILE_FIELDS},{}", self.extended_profile_fields)
        }
    }

    /// Logs app events for the page-scoped user.
    pub async fn send_custom_event(
        &self,
        application_id: &str,
        request: &CustomEventRequest,
    ) -> Result<SendResponse, CourierError> {
        let url = self.url(&format!("{application_id}/activities"));
        self.execute(CallKind::CustomEvent, || self.http.post(&url).json(request))
            .await
    }

    pub async fn subscriptions(
        &self,
        application_id: &str,
        app_token: &str,
    ) -> Option<SubscriptionsResponse> {
        let url = self.url(&format!("{application_id}/subscriptions"));
        let result = self
            .execute(CallKind::Subscription, || {
                self.http.get(&url).query(&[("access_token", app_token)])
            })
            .await;
        CallKind::Subscription.absorb(result)
    }

    /// Subscribes the application to page webhooks.
    pub async fn subscribe(
        &self,
        application_id: &str,
        callback_url: &str,
        fields: &str,
        verify_token: &str,
        app_token: &str,
    ) -> Option<SuccessResponse> {
        if callback_url.is_empty() {
            error!(application_id, "no callback URL found to subscribe webhook");
            return None;
        }
        let url = self.url(&format!("{application_id}/subscriptions"));
        let result = self
            .execute(CallKind::Subscription, || {
                self.http.post(&url).query(&[
                    ("object", "page"),
                    ("callback_url", callback_url),
                    ("fields", fields),
                    ("verify_token", verify_token),
                    ("access_token", app_token),
                ])
            })
            .await;
        CallKind::Subscription.absorb(result)
    }

    pub async fn delete_subscribed_apps(
        &self,
        page_id: &str,
        fields: &str,
        token: &str,
    ) -> Option<SuccessResponse> {
        let url = self.url(&format!("{page_id}/subscribed_apps"));
        let result = self
            .execute(CallKind::Subscription, || {
                self.http
                    .delete(&url)
                    .query(&[("subscribed_fields", fields), ("access_token", token)])
            })
            .await;
        CallKind::Subscription.absorb(result)
    }

    pub async fn subscribed_apps(
        &self,
        page_id: &str,
        fields: &str,
        token: &str,
    ) -> Option<SuccessResponse> {
        let url = self.url(&format!("{page_id}/subscribed_apps"));
        let result = self
            .execute(CallKind::Subscription, || {
                self.http
                    .post(&url)
                    .query(&[("subscribed_fields", fields), ("access_token", token)])
            })
            .await;
        CallKind::Subscription.absorb(result)
    }

    /// True when the platform status page answers with a success status.
    pub async fn health_check(&self) -> bool {
        match self.http.get(&self.status_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                error!(error = %e, "messenger status check failed");
                false
            }
        }
    }

    /// Runs one call under a request timer.
    ///
    /// `build` is invoked once per attempt. Only calls whose policy allows it
    /// are retried, and only on transient Graph errors: at most
    /// `retry_limit + 1` attempts are made.
    async fn execute<T, F>(&self, kind: CallKind, build: F) -> Result<T, CourierError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut timer = RequestTimer::start(kind.timer_name());
        let mut attempt: u32 = 0;

        loop {
            let response = match build().send().await {
                Ok(response) => response,
                Err(e) => {
                    timer.throwable(&e);
                    return Err(CourierError::Connector {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            };

            let status = response.status();
            debug!(call = ?kind, status = %status, attempt, "messenger response received");

            if status.is_success() {
                let body = response.bytes().await.map_err(|e| {
                    timer.throwable(&e);
                    CourierError::Connector {
                        message: format!("failed to read response body: {e}"),
                        source: Some(Box::new(e)),
                    }
                })?;
                return serde_json::from_slice(&body).map_err(|e| {
                    timer.throwable(&e);
                    CourierError::Connector {
                        message: format!("failed to parse messenger response: {e}"),
                        source: Some(Box::new(e)),
                    }
                });
            }

            let body = response.text().await.unwrap_or_default();
            kind.log_platform_error(status.as_u16(), &body);
            let graph_error = serde_json::from_str::<ErrorContainer>(&body)
                .ok()
                .and_then(|c| c.error);

            if kind.retries()
                && attempt < self.retry_limit
                && graph_error.as_ref().is_some_and(is_transient)
            {
                attempt += 1;
                info!(
                    call = ?kind,
                    attempt,
                    wait_ms = self.retry_wait.as_millis() as u64,
                    "transient messenger error, retrying"
                );
                tokio::time::sleep(self.retry_wait).await;
                continue;
            }

            let message = graph_error
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("messenger returned {status}"));
            timer.throwable(&message);
            return Err(CourierError::connector(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessagingType, OutMessage, Recipient, SenderAction};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> MessengerClient {
        let config = MessengerConfig {
            retry_wait_ms: 10,
            ..MessengerConfig::default()
        };
        MessengerClient::new(&config)
            .unwrap()
            .with_base_url(server.uri())
            .with_status_url(format!("{}/platform/api-status", server.uri()))
    }

    fn text_request() -> MessageRequest {
        MessageRequest {
            recipient: Recipient::id("U1"),
            message: OutMessage {
                text: Some("hello".into()),
                ..OutMessage::default()
            },
            messaging_type: MessagingType::Response,
            tag: None,
        }
    }

    fn graph_error(code: i64, subcode: Option<i64>) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": format!("error {code}"),
                "type": "OAuthException",
                "code": code,
                "error_subcode": subcode,
                "fbtrace_id": "trace"
            }
        })
    }

    // ---- Test 1: successful send passes the token as a query param ----
    #[tokio::test]
    async fn send_message_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(query_param("access_token", "page-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recipient_id": "U1",
                "message_id": "mid.1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .send_message("page-token", &text_request())
            .await
            .unwrap();
        assert_eq!(response.message_id.as_deref(), Some("mid.1"));
    }

    // ---- Test 2: transient error is retried once, then succeeds ----
    #[tokio::test]
    async fn transient_error_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_json(graph_error(1200, None)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recipient_id": "U1",
                "message_id": "mid.2"
            })))
            .mount(&server)
            .await;

        let response = client(&server)
            .send_message("t", &text_request())
            .await
            .unwrap();
        assert_eq!(response.message_id.as_deref(), Some("mid.2"));
    }

    // ---- Test 3: persistent transient error stops after limit + 1 attempts ----
    #[tokio::test]
    async fn transient_error_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(graph_error(200, Some(1545041))))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server)
            .send_message("t", &text_request())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Connector { .. }));
        assert!(err.to_string().contains("error 200"));
    }

    // ---- Test 4: fatal error is not retried ----
    #[tokio::test]
    async fn fatal_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(graph_error(100, None)))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .send_message("t", &text_request())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connector error: error 100");
    }

    // ---- Test 5: sender actions never retry and swallow failures ----
    #[tokio::test]
    #[tracing_test::traced_test]
    async fn sender_action_failure_is_absorbed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(graph_error(1200, None)))
            .expect(1)
            .mount(&server)
            .await;

        let request = ActionRequest {
            recipient: Recipient::id("U1"),
            sender_action: SenderAction::TypingOn,
        };
        assert!(client(&server).send_action("t", &request).await.is_none());
        assert!(logs_contain("ignored messenger failure"));
    }

    // ---- Test 6: profile falls back to an empty profile ----
    #[tokio::test]
    async fn user_profile_defaults_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/U1"))
            .and(query_param("fields", "first_name,last_name,profile_pic"))
            .respond_with(ResponseTemplate::new(403).set_body_json(graph_error(230, None)))
            .mount(&server)
            .await;

        let profile = client(&server).user_profile("t", "U1").await;
        assert_eq!(profile, UserProfile::default());
    }

    #[tokio::test]
    async fn user_profile_requests_extended_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/U1"))
            .and(query_param("fields", "first_name,last_name,profile_pic,locale,timezone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "profile_pic": "https://cdn/ada.png",
                "locale": "en_GB",
                "timezone": 0,
                "id": "U1"
            })))
            .mount(&server)
            .await;

        let config = MessengerConfig {
            extended_profile_fields: "locale,timezone".into(),
            ..MessengerConfig::default()
        };
        let client = MessengerClient::new(&config).unwrap().with_base_url(server.uri());
        let profile = client.user_profile("t", "U1").await;
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(profile.picture.as_deref(), Some("https://cdn/ada.png"));
        assert_eq!(profile.timezone, Some(0.0));
    }

    // ---- Test 7: thread owner and secondary receivers ----
    #[tokio::test]
    async fn thread_owner_reads_first_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/thread_owner"))
            .and(query_param("recipient", "U1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"thread_owner": {"app_id": "263902037430900"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/secondary_receivers"))
            .and(query_param("fields", "id,name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "12345678910", "name": "David's Composer"}]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.thread_owner("t", "U1").await.as_deref(),
            Some("263902037430900")
        );
        let receivers = client.secondary_receivers("t").await.unwrap();
        assert_eq!(receivers[0].id, "12345678910");
    }

    // ---- Test 8: subscription without callback url is refused locally ----
    #[tokio::test]
    async fn subscribe_requires_callback_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.subscribe("app", "", "messages", "v", "app-token").await.is_none());
    }

    // ---- Test 9: health check follows the status page ----
    #[tokio::test]
    async fn health_check_reads_status_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/platform/api-status"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(!client(&server).health_check().await);
    }

    // ---- Test 10: multipart upload returns the attachment id ----
    #[tokio::test]
    async fn binary_upload_returns_attachment_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/message_attachments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "attachment_id": "1857777774821032"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .upload_attachment("t", OutAttachmentType::Image, b"\x89PNG", "image/png", "a.png")
            .await
            .unwrap();
        assert_eq!(response.attachment_id.as_deref(), Some("1857777774821032"));
    }
}
