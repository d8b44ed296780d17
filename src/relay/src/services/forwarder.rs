//! Outbound call construction for the two remote services
//!
//! One [`RequestDescriptor`] becomes exactly one POST. Nothing is retried and
//! nothing is kept between calls.

use axum::http::StatusCode;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use ml_tester_shared::auth::{auth_header_name, bearer_value, VISION_KEY_HEADER};
use ml_tester_shared::types::api::RelayResponse;
use ml_tester_shared::vision::{analyze_url, decode_inline_image};
use ml_tester_shared::{ImageRef, RequestDescriptor, ScoringRequest, VisionRequest};

use crate::config::UpstreamConfig;
use crate::error::{ApiError, Result};

const JSON_CONTENT_TYPE: &str = "application/json";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";
const VISION_FAILURE_MESSAGE: &str = "Vision API request failed";

/// Forwards relay requests to scoring and Vision endpoints
#[derive(Clone)]
pub struct RelayForwarder {
    client: Client,
    vision_api_version: String,
}

impl RelayForwarder {
    pub fn new(client: Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            vision_api_version: config.vision_api_version.clone(),
        }
    }

    /// Execute the single outbound call described by `descriptor`
    pub async fn forward(&self, descriptor: RequestDescriptor) -> Result<RelayResponse> {
        match descriptor {
            RequestDescriptor::Scoring(request) => self.forward_scoring(request).await,
            RequestDescriptor::Vision(request) => self.forward_vision(request).await,
        }
    }

    async fn forward_scoring(&self, request: ScoringRequest) -> Result<RelayResponse> {
        let name = auth_header_name(&request.auth_header_name);
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ApiError::validation("keyHeaderName", format!("Invalid header name: {}", name))
        })?;
        let header_value = HeaderValue::from_str(&bearer_value(&request.api_key)).map_err(|_| {
            ApiError::validation("apiKey", "API key contains characters not allowed in a header")
        })?;

        debug!(endpoint = %request.endpoint, header = %header_name, "Forwarding scoring request");

        let response = self
            .client
            .post(&request.endpoint)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(header_name, header_value)
            .body(request.body)
            .send()
            .await?;

        let (status, data) = read_remote_json(response).await?;
        info!(status = status.as_u16(), "Scoring endpoint answered");

        // Scoring answers are passed through whatever their status
        Ok(RelayResponse {
            data,
            status: status.as_u16(),
        })
    }

    async fn forward_vision(&self, request: VisionRequest) -> Result<RelayResponse> {
        let url = analyze_url(
            &request.endpoint,
            &self.vision_api_version,
            &request.features,
            &request.crop_ratios,
        );
        let key = HeaderValue::from_str(&request.api_key).map_err(|_| {
            ApiError::validation("apiKey", "API key contains characters not allowed in a header")
        })?;

        let builder = self.client.post(&url).header(VISION_KEY_HEADER, key);
        let builder = match request.image {
            ImageRef::Url(image_url) => builder
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(serde_json::to_vec(&json!({ "url": image_url }))?),
            ImageRef::InlineBase64(inline) => {
                let bytes = decode_inline_image(&inline)?;
                debug!(bytes = bytes.len(), "Decoded inline image");
                builder
                    .header(CONTENT_TYPE, BINARY_CONTENT_TYPE)
                    .body(bytes)
            }
        };

        debug!(url = %url, "Forwarding vision request");
        let response = builder.send().await?;
        let (status, data) = read_remote_json(response).await?;
        info!(status = status.as_u16(), "Vision endpoint answered");

        if !status.is_success() {
            let message = data
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or(VISION_FAILURE_MESSAGE)
                .to_string();
            let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(ApiError::remote(status, message, data));
        }

        Ok(RelayResponse {
            data,
            status: status.as_u16(),
        })
    }
}

/// Status and JSON body of a remote answer.
///
/// Empty bodies read as `null`. A non-JSON body is an error on success and is
/// kept as a JSON string on failure so the remote's message still reaches the
/// caller.
async fn read_remote_json(response: reqwest::Response) -> Result<(reqwest::StatusCode, Value)> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if bytes.is_empty() {
        return Ok((status, Value::Null));
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(data) => Ok((status, data)),
        Err(_) if !status.is_success() => Ok((
            status,
            Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        )),
        Err(e) => Err(ApiError::internal(format!(
            "Remote service returned invalid JSON: {}",
            e
        ))),
    }
}
