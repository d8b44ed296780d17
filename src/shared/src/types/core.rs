//! Core type definitions for the ML Tester
//!
//! Descriptors for the two remote services, the normalized request descriptor
//! handed to the relay, and the uniform result and history shapes consumed by
//! the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::DEFAULT_AUTH_HEADER;
use crate::error::{Result, SharedError};

// ============================================================================
// SERVICE SELECTION
// ============================================================================

/// Remote service a session is currently pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "ml-studio")]
    MlStudio,
    #[serde(rename = "vision")]
    Vision,
}

impl Default for ServiceType {
    fn default() -> Self {
        ServiceType::MlStudio
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ml-studio" | "ml" | "scoring" => Ok(ServiceType::MlStudio),
            "vision" => Ok(ServiceType::Vision),
            _ => Err(format!("Invalid service type: {}", s)),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::MlStudio => write!(f, "ml-studio"),
            ServiceType::Vision => write!(f, "vision"),
        }
    }
}

// ============================================================================
// SCORING ENDPOINT
// ============================================================================

/// One configured scoring target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_auth_header_name", rename = "keyHeaderName")]
    pub auth_header_name: String,
}

fn default_auth_header_name() -> String {
    DEFAULT_AUTH_HEADER.to_string()
}

impl Default for EndpointDescriptor {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            auth_header_name: default_auth_header_name(),
        }
    }
}

impl EndpointDescriptor {
    /// Both url and key must be present before anything is sent
    pub fn ensure_configured(&self) -> Result<()> {
        if self.url.trim().is_empty() || self.api_key.trim().is_empty() {
            return Err(SharedError::missing_credentials(
                "Please configure endpoint URL and API key",
            ));
        }
        Ok(())
    }

    /// Whether anything worth persisting has been entered
    pub fn has_values(&self) -> bool {
        !self.url.is_empty() || !self.api_key.is_empty()
    }
}

// ============================================================================
// VISION ENDPOINT
// ============================================================================

/// Analysis features offered by the Vision image-analysis API.
///
/// Declaration order is the canonical order used when a feature set is
/// rendered into a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureName {
    Caption,
    DenseCaptions,
    Tags,
    Objects,
    People,
    Read,
    SmartCrops,
}

impl FeatureName {
    pub const ALL: [FeatureName; 7] = [
        FeatureName::Caption,
        FeatureName::DenseCaptions,
        FeatureName::Tags,
        FeatureName::Objects,
        FeatureName::People,
        FeatureName::Read,
        FeatureName::SmartCrops,
    ];

    /// Wire spelling of the feature
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::Caption => "caption",
            FeatureName::DenseCaptions => "denseCaptions",
            FeatureName::Tags => "tags",
            FeatureName::Objects => "objects",
            FeatureName::People => "people",
            FeatureName::Read => "read",
            FeatureName::SmartCrops => "smartCrops",
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FeatureName::ALL
            .iter()
            .copied()
            .find(|feature| feature.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid vision feature: {}", s))
    }
}

/// Features requested when the caller names none
pub fn default_features() -> BTreeSet<FeatureName> {
    [FeatureName::Caption, FeatureName::Tags].into_iter().collect()
}

/// Configured Vision target plus the analysis options to request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionDescriptor {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_features")]
    pub features: BTreeSet<FeatureName>,
    #[serde(default = "default_crop_ratios")]
    pub crop_ratios: Vec<f64>,
}

fn default_crop_ratios() -> Vec<f64> {
    vec![1.0]
}

impl Default for VisionDescriptor {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            features: default_features(),
            crop_ratios: default_crop_ratios(),
        }
    }
}

impl VisionDescriptor {
    pub fn ensure_configured(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() || self.api_key.trim().is_empty() {
            return Err(SharedError::missing_credentials(
                "Please configure Vision endpoint and API key",
            ));
        }
        Ok(())
    }

    /// Feature and crop-ratio checks performed before an analysis is sent
    pub fn validate_options(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(SharedError::validation(
                "features",
                "Please select at least one Vision feature",
            ));
        }

        if self.features.contains(&FeatureName::SmartCrops) {
            if self.crop_ratios.is_empty() {
                return Err(SharedError::validation(
                    "cropRatios",
                    "Smart crops needs at least one aspect ratio",
                ));
            }
            if let Some(bad) = self.crop_ratios.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
                return Err(SharedError::validation(
                    "cropRatios",
                    format!("Aspect ratio must be a positive number, got {}", bad),
                ));
            }
        }

        Ok(())
    }

    /// Crop ratios worth sending: only when smart crops were requested
    pub fn effective_crop_ratios(&self) -> &[f64] {
        if self.features.contains(&FeatureName::SmartCrops) {
            &self.crop_ratios
        } else {
            &[]
        }
    }
}

// ============================================================================
// REQUEST DESCRIPTOR
// ============================================================================

/// Where the image for a Vision analysis comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Url(String),
    /// Base64 payload, optionally carrying a `data:image/...;base64,` prefix
    InlineBase64(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRequest {
    pub endpoint: String,
    pub api_key: String,
    pub auth_header_name: String,
    /// Raw JSON text, forwarded verbatim
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub endpoint: String,
    pub api_key: String,
    pub features: BTreeSet<FeatureName>,
    pub crop_ratios: Vec<f64>,
    pub image: ImageRef,
}

/// Normalized description of one relayed call
#[derive(Debug, Clone, PartialEq)]
pub enum RequestDescriptor {
    Scoring(ScoringRequest),
    Vision(VisionRequest),
}

impl RequestDescriptor {
    pub fn service_type(&self) -> ServiceType {
        match self {
            RequestDescriptor::Scoring(_) => ServiceType::MlStudio,
            RequestDescriptor::Vision(_) => ServiceType::Vision,
        }
    }

    pub fn scoring(endpoint: &EndpointDescriptor, body: impl Into<String>) -> Self {
        RequestDescriptor::Scoring(ScoringRequest {
            endpoint: endpoint.url.clone(),
            api_key: endpoint.api_key.clone(),
            auth_header_name: endpoint.auth_header_name.clone(),
            body: body.into(),
        })
    }

    pub fn vision(vision: &VisionDescriptor, image: ImageRef) -> Self {
        RequestDescriptor::Vision(VisionRequest {
            endpoint: vision.endpoint.clone(),
            api_key: vision.api_key.clone(),
            features: vision.features.clone(),
            crop_ratios: vision.effective_crop_ratios().to_vec(),
            image,
        })
    }
}

// ============================================================================
// RESULTS AND HISTORY
// ============================================================================

/// Uniform result shape shown to the user, whichever service answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub data: serde_json::Value,
    pub status_code: u16,
    pub duration_ms: u64,
}

impl ResponseEnvelope {
    pub fn new(data: serde_json::Value, status_code: u16, duration_ms: u64) -> Self {
        Self {
            data,
            status_code,
            duration_ms,
        }
    }

    /// Envelope with an error descriptor in place of data
    pub fn failure(message: impl Into<String>, status_code: u16, duration_ms: u64) -> Self {
        Self {
            data: serde_json::json!({ "error": message.into() }),
            status_code,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Record of one completed scoring send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub request_body: String,
    pub response_body: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub is_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_preview: Option<String>,
}

impl HistoryEntry {
    pub fn new(
        endpoint: impl Into<String>,
        request_body: impl Into<String>,
        envelope: &ResponseEnvelope,
        is_image: bool,
        image_preview: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now(),
            endpoint: endpoint.into(),
            request_body: request_body.into(),
            response_body: envelope.data.to_string(),
            status_code: envelope.status_code,
            duration_ms: envelope.duration_ms,
            is_image,
            image_preview,
        }
    }
}
