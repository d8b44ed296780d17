//! Shared types and request-shaping rules for the ML Tester
//!
//! Both the relay and the client build outbound calls from the same rules:
//! Bearer prefixing for scoring endpoints, subscription-key auth and the fixed
//! analysis route for Vision, and inline image decoding.

pub mod auth;
pub mod error;
pub mod types;
pub mod vision;

pub use error::{Result, SharedError};
pub use types::*;
