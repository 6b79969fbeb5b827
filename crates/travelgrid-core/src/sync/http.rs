//! HTTP/JSON implementation of the sync transport.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::transport::{
    PushRequest, PushResponse, RegisterDeviceRequest, SyncTransport, TransportError,
    TransportResult,
};
use crate::config::SyncConfig;
use crate::models::{Conflict, ConflictId, ConflictStatus, DeviceId, Resolution, SyncMetadata};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the `/sync/...` routes under an API base URL
#[derive(Clone)]
pub struct HttpSyncTransport {
    base_url: String,
    access_token: Option<String>,
    client: Client,
}

impl fmt::Debug for HttpSyncTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpSyncTransport")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpSyncTransport {
    pub fn new(base_url: impl Into<String>) -> TransportResult<Self> {
        Self::with_options(base_url, None, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        base_url: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            access_token: normalize_text_option(access_token),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Build a transport from a validated session config
    pub fn from_config(config: &SyncConfig) -> TransportResult<Self> {
        let base_url = config
            .base_url()
            .map_err(|error| TransportError::InvalidConfiguration(error.to_string()))?;
        Self::with_options(base_url, config.token(), config.timeout())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/sync/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> TransportResult<T> {
        let response = self.authorized(request).send().await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(TransportError::InvalidPayload(
                "response body was empty".to_string(),
            ));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl SyncTransport for HttpSyncTransport {
    async fn generate_device_id(&self) -> TransportResult<DeviceId> {
        let payload: DeviceIdResponse = self
            .send(self.client.get(self.url("generate-device-id")))
            .await?;
        normalize_text_option(payload.device_id)
            .map(DeviceId::new)
            .ok_or_else(|| {
                TransportError::InvalidPayload("response did not include deviceId".to_string())
            })
    }

    async fn register_device(&self, request: &RegisterDeviceRequest) -> TransportResult<()> {
        tracing::debug!(
            "Registering device {} for {}",
            request.device_id,
            request.data_type
        );
        let _: serde_json::Value = self
            .send(self.client.post(self.url("register-device")).json(request))
            .await?;
        Ok(())
    }

    async fn push(&self, request: &PushRequest) -> TransportResult<PushResponse> {
        tracing::debug!(
            "Pushing {} {} change(s) for device {}",
            request.changes.len(),
            request.data_type,
            request.device_id
        );
        self.send(self.client.post(self.url("sync")).json(request))
            .await
    }

    async fn fetch_status(
        &self,
        user_id: &str,
        device_id: &DeviceId,
    ) -> TransportResult<Vec<SyncMetadata>> {
        let payload: StatusResponse = self
            .send(
                self.client
                    .get(self.url("status"))
                    .query(&[("userId", user_id), ("deviceId", device_id.as_str())]),
            )
            .await?;
        Ok(payload.sync_metadata)
    }

    async fn fetch_conflicts(&self, user_id: &str) -> TransportResult<Vec<Conflict>> {
        let payload: ConflictsResponse = self
            .send(
                self.client
                    .get(self.url("conflicts"))
                    .query(&[("userId", user_id), ("status", "pending")]),
            )
            .await?;
        Ok(payload
            .conflicts
            .into_iter()
            .filter(|conflict| conflict.status == ConflictStatus::Pending)
            .collect())
    }

    async fn resolve_conflict(
        &self,
        conflict_id: &ConflictId,
        resolution: &Resolution,
    ) -> TransportResult<()> {
        let body = ResolveConflictRequest {
            conflict_id,
            resolution,
        };
        let _: serde_json::Value = self
            .send(self.client.post(self.url("resolve-conflict")).json(&body))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceIdResponse {
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(default)]
    sync_metadata: Vec<SyncMetadata>,
}

#[derive(Debug, Deserialize)]
struct ConflictsResponse {
    #[serde(default)]
    conflicts: Vec<Conflict>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveConflictRequest<'a> {
    conflict_id: &'a ConflictId,
    resolution: &'a Resolution,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn ensure_success(response: Response) -> TransportResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Api {
        status: status.as_u16(),
        message: parse_api_error(status, &body),
    })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let compact = compact_text(body);
    if compact.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> TransportResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        TransportError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(TransportError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url("https://api.example.com/api/".to_string()).unwrap(),
            "https://api.example.com/api"
        );
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        assert_eq!(
            parse_api_error(
                StatusCode::BAD_REQUEST,
                r#"{"message": "Device not registered for sync"}"#
            ),
            "Device not registered for sync (400)"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, r#"{"error": "upstream"}"#),
            "upstream (502)"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "  "),
            "HTTP 500"
        );
    }

    #[test]
    fn parse_api_error_truncates_plain_bodies() {
        let page = format!("<html>{}</html>", "x".repeat(400));
        let message = parse_api_error(StatusCode::BAD_GATEWAY, &page);
        assert_eq!(message.len(), 180 + " (502)".len());
        assert!(message.starts_with("<html>"));
    }

    #[test]
    fn debug_redacts_access_token() {
        let transport = HttpSyncTransport::with_options(
            "https://api.example.com",
            Some("secret".to_string()),
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        let rendered = format!("{transport:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("https://api.example.com"));
    }

    #[test]
    fn from_config_applies_normalized_url() {
        let config = SyncConfig::new("http://localhost:5000/api/", "u1");
        let transport = HttpSyncTransport::from_config(&config).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:5000/api");
        assert_eq!(
            transport.url("sync"),
            "http://localhost:5000/api/sync/sync"
        );
    }
}
