//! Authentication header rules for the remote services

/// Header used for scoring endpoints when the caller names none
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// Subscription key header used by the Vision API
pub const VISION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

pub const BEARER_PREFIX: &str = "Bearer ";

/// Prefix a scoring key with `Bearer ` unless it already carries it
pub fn bearer_value(api_key: &str) -> String {
    if api_key.starts_with(BEARER_PREFIX) {
        api_key.to_string()
    } else {
        format!("{}{}", BEARER_PREFIX, api_key)
    }
}

/// Header name to carry the scoring key, falling back to `Authorization`
pub fn auth_header_name(name: &str) -> &str {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_AUTH_HEADER
    } else {
        trimmed
    }
}
