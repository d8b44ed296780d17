//! Vision image-analysis request shaping
//!
//! Builds the analyze URL for a feature set and decodes inline images supplied
//! as base64, with or without a `data:image/...;base64,` prefix.

use std::collections::BTreeSet;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SharedError};
use crate::types::core::FeatureName;

pub const ANALYZE_ROUTE: &str = "/computervision/imageanalysis:analyze";
pub const DEFAULT_API_VERSION: &str = "2024-02-01";

static DATA_URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/[\w.+-]+;base64,").expect("valid data url regex"));

// Padding is optional on inline uploads
const INLINE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Comma-join crop ratios in their shortest decimal form (`1`, `1.5`, `0.67`)
pub fn join_ratios(ratios: &[f64]) -> String {
    ratios
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn join_features(features: &BTreeSet<FeatureName>) -> String {
    features
        .iter()
        .map(FeatureName::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Full analyze URL for `endpoint`.
///
/// The aspect-ratio parameter is only emitted when smart crops are requested
/// and at least one ratio is present.
pub fn analyze_url(
    endpoint: &str,
    api_version: &str,
    features: &BTreeSet<FeatureName>,
    crop_ratios: &[f64],
) -> String {
    let mut url = format!(
        "{}{}?api-version={}&features={}",
        endpoint.trim_end_matches('/'),
        ANALYZE_ROUTE,
        api_version,
        join_features(features)
    );

    if features.contains(&FeatureName::SmartCrops) && !crop_ratios.is_empty() {
        url.push_str("&smartCrops-aspect-ratios=");
        url.push_str(&join_ratios(crop_ratios));
    }

    url
}

/// Drop a leading `data:image/<subtype>;base64,` prefix, if any.
///
/// Subtypes may carry `-`, `+` or `.` (`x-icon`, `svg+xml`).
pub fn strip_data_url_prefix(inline: &str) -> &str {
    match DATA_URL_PREFIX.find(inline) {
        Some(prefix) => &inline[prefix.end()..],
        None => inline,
    }
}

/// Raw image bytes for an inline base64 payload
pub fn decode_inline_image(inline: &str) -> Result<Vec<u8>> {
    let payload: String = strip_data_url_prefix(inline)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    INLINE_ENGINE
        .decode(payload.as_bytes())
        .map_err(|e| SharedError::validation("imageBase64", format!("Invalid base64 image: {}", e)))
}

/// `data:image/<subtype>;base64,<payload>` for raw image bytes
pub fn encode_data_url(subtype: &str, bytes: &[u8]) -> String {
    encode_data_url_with_mime(&format!("image/{}", subtype), bytes)
}

pub fn encode_data_url_with_mime(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, INLINE_ENGINE.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(list: &[FeatureName]) -> BTreeSet<FeatureName> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_analyze_url_with_features() {
        let url = analyze_url(
            "https://res.cognitiveservices.azure.com/",
            DEFAULT_API_VERSION,
            &features(&[FeatureName::Tags, FeatureName::Caption]),
            &[],
        );
        assert_eq!(
            url,
            "https://res.cognitiveservices.azure.com/computervision/imageanalysis:analyze\
             ?api-version=2024-02-01&features=caption,tags"
        );
    }

    #[test]
    fn test_crop_ratios_only_with_smart_crops() {
        let without = analyze_url(
            "https://v",
            DEFAULT_API_VERSION,
            &features(&[FeatureName::Caption]),
            &[1.0, 1.78],
        );
        assert!(!without.contains("smartCrops-aspect-ratios"));

        let with = analyze_url(
            "https://v",
            DEFAULT_API_VERSION,
            &features(&[FeatureName::SmartCrops]),
            &[1.0, 1.5, 0.67],
        );
        assert!(with.ends_with("&features=smartCrops&smartCrops-aspect-ratios=1,1.5,0.67"));

        let empty = analyze_url(
            "https://v",
            DEFAULT_API_VERSION,
            &features(&[FeatureName::SmartCrops]),
            &[],
        );
        assert!(!empty.contains("smartCrops-aspect-ratios"));
    }

    #[test]
    fn test_strip_exact_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,aGk="), "aGk=");
        assert_eq!(strip_data_url_prefix("data:image/jpeg;base64,aGk="), "aGk=");
        assert_eq!(strip_data_url_prefix("aGk="), "aGk=");
        assert_eq!(
            strip_data_url_prefix("data:text/plain;base64,aGk="),
            "data:text/plain;base64,aGk="
        );
    }

    #[test]
    fn test_prefixed_and_bare_payload_decode_identically() {
        let bare = "iVBORw0KGgoAAAANSUhEUg==";
        let prefixed = format!("data:image/png;base64,{}", bare);
        assert_eq!(
            decode_inline_image(&prefixed).unwrap(),
            decode_inline_image(bare).unwrap()
        );
        assert_eq!(&decode_inline_image(bare).unwrap()[1..4], b"PNG");
    }

    #[test]
    fn test_decode_tolerates_missing_padding() {
        assert_eq!(decode_inline_image("aGk").unwrap(), b"hi");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_inline_image("not base64 at all!"),
            Err(SharedError::Validation { .. })
        ));
    }

    #[test]
    fn test_data_url_encoding() {
        let url = encode_data_url("png", b"hi");
        assert_eq!(url, "data:image/png;base64,aGk=");
        assert_eq!(decode_inline_image(&url).unwrap(), b"hi");
    }

    #[test]
    fn test_hyphenated_and_suffixed_subtypes_are_stripped() {
        let icon = encode_data_url("x-icon", b"hi");
        assert_eq!(icon, "data:image/x-icon;base64,aGk=");
        assert_eq!(strip_data_url_prefix(&icon), "aGk=");
        assert_eq!(decode_inline_image(&icon).unwrap(), b"hi");

        let svg = encode_data_url("svg+xml", b"<svg/>");
        assert_eq!(decode_inline_image(&svg).unwrap(), b"<svg/>");

        let vendor = "data:image/vnd.microsoft.icon;base64,aGk=";
        assert_eq!(decode_inline_image(vendor).unwrap(), b"hi");
    }
}
