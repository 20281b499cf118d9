// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud API.
//!
//! Tokens travel as bearer headers. Calls are not retried: a failure is
//! returned to the caller with the platform's message.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use courier_config::model::WhatsAppConfig;
use courier_core::{CourierError, RequestTimer};

use crate::types::{ErrorContainer, MediaInfo, MediaUploadResponse, SendRequest, SendResponse};

/// Downloaded media bytes with their content type.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    base_url: String,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, CourierError> {
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
        })
    }

    /// Overrides the base URL (used by tests against a mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn send_message(
        &self,
        phone_number_id: &str,
        token: &str,
        request: &SendRequest,
    ) -> Result<SendResponse, CourierError> {
        let request = self
            .http
            .post(self.url(&format!("{phone_number_id}/messages")))
            .bearer_auth(token)
            .json(request);
        self.execute("whatsapp_send_message", request).await
    }

    /// Uploads media to the number's account and returns the media id.
    pub async fn upload_media(
        &self,
        phone_number_id: &str,
        token: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        file_name: &str,
    ) -> Result<String, CourierError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| CourierError::Connector {
                message: format!("invalid media type {mime_type}: {e}"),
                source: Some(Box::new(e)),
            })?;
        let form = Form::new()
            .part("file", part)
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string());
        let request = self
            .http
            .post(self.url(&format!("{phone_number_id}/media")))
            .bearer_auth(token)
            .multipart(form);
        let response: MediaUploadResponse = self.execute("whatsapp_upload_media", request).await?;
        Ok(response.id)
    }

    /// Download URL of an inbound media.
    pub async fn media_url(&self, media_id: &str, token: &str) -> Result<String, CourierError> {
        let request = self.http.get(self.url(media_id)).bearer_auth(token);
        let info: MediaInfo = self.execute("whatsapp_retrieve_media", request).await?;
        Ok(info.url)
    }

    /// Fetches a public file before uploading it.
    pub async fn download(&self, url: &str) -> Result<DownloadedMedia, CourierError> {
        let mut timer = RequestTimer::start("whatsapp_download_media");
        let response = self.http.get(url).send().await.map_err(|e| {
            timer.throwable(&e);
            CourierError::Connector {
                message: format!("failed to download {url}: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        if !response.status().is_success() {
            let message = format!("failed to download {url}: {}", response.status());
            timer.throwable(&message);
            return Err(CourierError::connector(message));
        }
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| {
            timer.throwable(&e);
            CourierError::Connector {
                message: format!("failed to read {url}: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        Ok(DownloadedMedia {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }

    /// True when the phone number is readable with `token`.
    pub async fn phone_number_reachable(&self, phone_number_id: &str, token: &str) -> bool {
        let request = self
            .http
            .get(self.url(phone_number_id))
            .query(&[("fields", "id")])
            .bearer_auth(token);
        self.execute::<serde_json::Value>("whatsapp_health_check", request)
            .await
            .is_ok()
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        name: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CourierError> {
        let mut timer = RequestTimer::start(name);
        let response = request.send().await.map_err(|e| {
            timer.throwable(&e);
            CourierError::Connector {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            }
        })?;

        let status = response.status();
        debug!(request = name, status = %status, "whatsapp response received");
        let body = response.text().await.map_err(|e| {
            timer.throwable(&e);
            CourierError::Connector {
                message: format!("failed to read response body: {e}"),
                source: Some(Box::new(e)),
            }
        })?;

        if !status.is_success() {
            warn!(request = name, status = status.as_u16(), body = %body, "whatsapp error");
            let message = serde_json::from_str::<ErrorContainer>(&body)
                .ok()
                .and_then(|c| c.error)
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("whatsapp returned {status}"));
            timer.throwable(&message);
            return Err(CourierError::connector(message));
        }

        serde_json::from_str(&body).map_err(|e| {
            timer.throwable(&e);
            CourierError::Connector {
                message: format!("failed to parse whatsapp response: {e}"),
                source: Some(Box::new(e)),
            }
        })
    }
}
