//! Shared type definitions for the ML Tester relay and client

pub mod api;
pub mod core;

pub use api::{RelayErrorBody, RelayRequest, RelayResponse};
pub use core::{
    default_features, EndpointDescriptor, FeatureName, HistoryEntry, ImageRef, RequestDescriptor,
    ResponseEnvelope, ScoringRequest, ServiceType, VisionDescriptor, VisionRequest,
};
