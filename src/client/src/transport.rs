//! Dispatch of a single request, either through the relay or straight to the
//! scoring endpoint

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use ml_tester_shared::auth::{auth_header_name, bearer_value};
use ml_tester_shared::types::api::{RelayErrorBody, RelayRequest, RelayResponse};
use ml_tester_shared::{RequestDescriptor, ScoringRequest};

use crate::error::{OrchestratorError, Result};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Shown instead of the transport message when a direct call never connects
pub const CORS_HINT_MESSAGE: &str = "This is likely a CORS error. Try enabling \"Use Proxy\" or enable CORS on your Azure ML endpoint.";

/// How a request reaches the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Posted to the relay, which makes the remote call
    Proxy,
    /// Sent straight to the scoring endpoint
    Direct,
}

impl TransportMode {
    pub fn from_proxy_flag(use_proxy: bool) -> Self {
        if use_proxy {
            TransportMode::Proxy
        } else {
            TransportMode::Direct
        }
    }
}

/// Remote JSON and the remote HTTP status
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAnswer {
    pub data: Value,
    pub status: u16,
}

impl From<RelayResponse> for RemoteAnswer {
    fn from(response: RelayResponse) -> Self {
        Self {
            data: response.data,
            status: response.status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    relay_url: String,
}

impl Transport {
    pub fn new(relay_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ml-tester/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OrchestratorError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            relay_url: relay_url.into(),
        })
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// Send `descriptor` using `mode`. Vision requests always go through the
    /// relay.
    pub async fn send(&self, mode: TransportMode, descriptor: &RequestDescriptor) -> Result<RemoteAnswer> {
        match (mode, descriptor) {
            (TransportMode::Direct, RequestDescriptor::Scoring(request)) => {
                self.send_direct(request).await
            }
            _ => self.send_via_relay(descriptor).await,
        }
    }

    async fn send_via_relay(&self, descriptor: &RequestDescriptor) -> Result<RemoteAnswer> {
        let payload = RelayRequest::from(descriptor.clone());
        debug!(relay = %self.relay_url, service = %descriptor.service_type(), "Posting to relay");

        let response = self
            .client
            .post(&self.relay_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                OrchestratorError::transport(format!("Could not reach relay: {}", e), false)
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            OrchestratorError::transport(format!("Failed to read relay response: {}", e), false)
        })?;

        if status.is_success() {
            let answer: RelayResponse = serde_json::from_slice(&bytes).map_err(|e| {
                OrchestratorError::internal(format!("Relay returned an unexpected answer: {}", e))
            })?;
            return Ok(answer.into());
        }

        match serde_json::from_slice::<RelayErrorBody>(&bytes) {
            Ok(body) if body.is_remote() => Err(OrchestratorError::Remote {
                status: status.as_u16(),
                message: body.error,
                payload: body.details.unwrap_or(Value::Null),
            }),
            Ok(body) => Err(OrchestratorError::Internal(body.error)),
            Err(_) => Err(OrchestratorError::internal(format!(
                "Relay answered with status {}",
                status.as_u16()
            ))),
        }
    }

    async fn send_direct(&self, request: &ScoringRequest) -> Result<RemoteAnswer> {
        let name = auth_header_name(&request.auth_header_name);
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            OrchestratorError::validation("keyHeaderName", format!("Invalid header name: {}", name))
        })?;
        let header_value = HeaderValue::from_str(&bearer_value(&request.api_key)).map_err(|_| {
            OrchestratorError::validation(
                "apiKey",
                "API key contains characters not allowed in a header",
            )
        })?;

        debug!(endpoint = %request.endpoint, "Calling scoring endpoint directly");

        let response = self
            .client
            .post(&request.endpoint)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(header_name, header_value)
            .body(request.body.clone())
            .send()
            .await
            .map_err(classify_direct_failure)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(classify_direct_failure)?;

        // Non-JSON failure bodies stay readable as a string
        let data = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(data) => data,
                Err(_) if !status.is_success() => {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                Err(e) => {
                    return Err(OrchestratorError::internal(format!(
                        "Remote service returned invalid JSON: {}",
                        e
                    )))
                }
            }
        };

        Ok(RemoteAnswer {
            data,
            status: status.as_u16(),
        })
    }
}

/// A direct call that never produced a response is most likely blocked or
/// unreachable; anything else keeps its own message
fn classify_direct_failure(err: reqwest::Error) -> OrchestratorError {
    if err.is_connect() || err.is_request() {
        OrchestratorError::transport(CORS_HINT_MESSAGE, true)
    } else {
        OrchestratorError::transport(err.to_string(), false)
    }
}
