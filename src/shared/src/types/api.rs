//! Relay wire types
//!
//! The relay accepts one flat JSON object whose populated fields depend on the
//! target service. [`RelayRequest`] is that object as it travels;
//! [`RequestDescriptor`] is the validated, service-specific form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::TryFrom;

use crate::auth::DEFAULT_AUTH_HEADER;
use crate::error::SharedError;
use crate::types::core::{
    default_features, FeatureName, ImageRef, RequestDescriptor, ScoringRequest, VisionRequest,
};

pub const KIND_MISSING_CREDENTIALS: &str = "missing_credentials";
pub const KIND_MISSING_IMAGE: &str = "missing_image";
pub const KIND_VALIDATION: &str = "validation_error";
pub const KIND_REMOTE: &str = "remote_error";
pub const KIND_INTERNAL: &str = "internal_error";

/// `serviceType` value selecting the Vision path; anything else is scoring
pub const SERVICE_TYPE_VISION: &str = "vision";

/// Request body accepted by the relay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_header_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_features: Option<Vec<FeatureName>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_crop_ratios: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// Successful relay answer: the remote JSON and the remote HTTP status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub data: serde_json::Value,
    pub status: u16,
}

/// Failed relay answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayErrorBody {
    pub error: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RelayErrorBody {
    pub fn is_remote(&self) -> bool {
        self.kind.as_deref() == Some(KIND_REMOTE) || self.details.is_some()
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RelayRequest {
    pub fn is_vision(&self) -> bool {
        self.service_type.as_deref() == Some(SERVICE_TYPE_VISION)
    }
}

impl TryFrom<RelayRequest> for RequestDescriptor {
    type Error = SharedError;

    fn try_from(request: RelayRequest) -> Result<Self, Self::Error> {
        if request.is_vision() {
            let (endpoint, api_key) =
                match (present(request.vision_endpoint), present(request.api_key)) {
                    (Some(endpoint), Some(api_key)) => (endpoint, api_key),
                    _ => {
                        return Err(SharedError::missing_credentials(
                            "Missing Vision endpoint or API key",
                        ))
                    }
                };

            let features: BTreeSet<FeatureName> = request
                .vision_features
                .unwrap_or_default()
                .into_iter()
                .collect();
            let features = if features.is_empty() {
                default_features()
            } else {
                features
            };

            let image = if let Some(url) = present(request.image_url) {
                ImageRef::Url(url)
            } else if let Some(inline) = present(request.image_base64) {
                ImageRef::InlineBase64(inline)
            } else {
                return Err(SharedError::missing_image(
                    "No image provided. Please upload an image or provide a URL.",
                ));
            };

            return Ok(RequestDescriptor::Vision(VisionRequest {
                endpoint,
                api_key,
                features,
                crop_ratios: request.smart_crop_ratios.unwrap_or_default(),
                image,
            }));
        }

        let (endpoint, api_key) = match (present(request.endpoint), present(request.api_key)) {
            (Some(endpoint), Some(api_key)) => (endpoint, api_key),
            _ => {
                return Err(SharedError::missing_credentials(
                    "Missing endpoint or API key",
                ))
            }
        };

        let body = request
            .request_body
            .ok_or_else(|| SharedError::validation("requestBody", "Missing request body"))?;

        Ok(RequestDescriptor::Scoring(ScoringRequest {
            endpoint,
            api_key,
            auth_header_name: present(request.key_header_name)
                .unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string()),
            body,
        }))
    }
}

impl From<RequestDescriptor> for RelayRequest {
    fn from(descriptor: RequestDescriptor) -> Self {
        match descriptor {
            RequestDescriptor::Scoring(scoring) => RelayRequest {
                endpoint: Some(scoring.endpoint),
                api_key: Some(scoring.api_key),
                key_header_name: Some(scoring.auth_header_name),
                request_body: Some(scoring.body),
                ..RelayRequest::default()
            },
            RequestDescriptor::Vision(vision) => {
                let (image_url, image_base64) = match vision.image {
                    ImageRef::Url(url) => (Some(url), None),
                    ImageRef::InlineBase64(inline) => (None, Some(inline)),
                };
                RelayRequest {
                    api_key: Some(vision.api_key),
                    service_type: Some(SERVICE_TYPE_VISION.to_string()),
                    vision_endpoint: Some(vision.endpoint),
                    vision_features: Some(vision.features.into_iter().collect()),
                    smart_crop_ratios: if vision.crop_ratios.is_empty() {
                        None
                    } else {
                        Some(vision.crop_ratios)
                    },
                    image_url,
                    image_base64,
                    ..RelayRequest::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<RequestDescriptor, SharedError> {
        let request: RelayRequest = serde_json::from_value(value).unwrap();
        RequestDescriptor::try_from(request)
    }

    #[test]
    fn test_scoring_request_from_wire() {
        let descriptor = parse(json!({
            "endpoint": "https://x/score",
            "apiKey": "abc",
            "keyHeaderName": "Authorization",
            "requestBody": "{\"a\":1}"
        }))
        .unwrap();

        assert_eq!(
            descriptor,
            RequestDescriptor::Scoring(ScoringRequest {
                endpoint: "https://x/score".into(),
                api_key: "abc".into(),
                auth_header_name: "Authorization".into(),
                body: "{\"a\":1}".into(),
            })
        );
    }

    #[test]
    fn test_blank_header_name_defaults_to_authorization() {
        let descriptor = parse(json!({
            "endpoint": "https://x/score",
            "apiKey": "abc",
            "keyHeaderName": "  ",
            "requestBody": "{}"
        }))
        .unwrap();

        match descriptor {
            RequestDescriptor::Scoring(s) => assert_eq!(s.auth_header_name, "Authorization"),
            other => panic!("unexpected descriptor: {:?}", other),
        }
    }

    #[test]
    fn test_missing_credentials() {
        let err = parse(json!({ "endpoint": "", "apiKey": "abc", "requestBody": "{}" }))
            .unwrap_err();
        assert_eq!(err.kind(), KIND_MISSING_CREDENTIALS);

        let err = parse(json!({
            "serviceType": "vision",
            "apiKey": "abc",
            "imageUrl": "https://img"
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing Vision endpoint or API key");
    }

    #[test]
    fn test_vision_without_image_is_rejected() {
        let err = parse(json!({
            "serviceType": "vision",
            "visionEndpoint": "https://vision",
            "apiKey": "abc",
            "visionFeatures": ["caption"]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), KIND_MISSING_IMAGE);
    }

    #[test]
    fn test_vision_defaults_and_url_preference() {
        let descriptor = parse(json!({
            "serviceType": "vision",
            "visionEndpoint": "https://vision",
            "apiKey": "abc",
            "imageUrl": "https://img/cat.png",
            "imageBase64": "aGVsbG8="
        }))
        .unwrap();

        match descriptor {
            RequestDescriptor::Vision(v) => {
                assert_eq!(v.features, default_features());
                assert_eq!(v.image, ImageRef::Url("https://img/cat.png".into()));
                assert!(v.crop_ratios.is_empty());
            }
            other => panic!("unexpected descriptor: {:?}", other),
        }
    }

    #[test]
    fn test_wire_round_trip_keeps_vision_shape() {
        let descriptor = RequestDescriptor::Vision(VisionRequest {
            endpoint: "https://vision".into(),
            api_key: "abc".into(),
            features: [FeatureName::Read, FeatureName::SmartCrops]
                .into_iter()
                .collect(),
            crop_ratios: vec![1.5],
            image: ImageRef::InlineBase64("data:image/png;base64,aGk=".into()),
        });

        let wire = RelayRequest::from(descriptor.clone());
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["serviceType"], "vision");
        assert_eq!(value["visionFeatures"], json!(["read", "smartCrops"]));
        assert!(value.get("imageUrl").is_none());

        assert_eq!(RequestDescriptor::try_from(wire).unwrap(), descriptor);
    }

    #[test]
    fn test_error_body_remote_detection() {
        let body: RelayErrorBody =
            serde_json::from_value(json!({ "error": "Missing endpoint or API key" })).unwrap();
        assert!(!body.is_remote());

        let body: RelayErrorBody = serde_json::from_value(json!({
            "error": "Invalid image",
            "details": { "error": { "message": "Invalid image" } }
        }))
        .unwrap();
        assert!(body.is_remote());
    }
}
