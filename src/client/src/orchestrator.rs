//! Request orchestrator
//!
//! Owns one testing session: the endpoint and Vision configuration, the proxy
//! preference, the selected service and the request history. Each send is
//! validated, dispatched, timed and normalized into a [`ResponseEnvelope`].

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use ml_tester_shared::{
    EndpointDescriptor, HistoryEntry, ImageRef, RequestDescriptor, ResponseEnvelope, ServiceType,
    VisionDescriptor,
};

use crate::error::{OrchestratorError, Result};
use crate::history::History;
use crate::storage::{
    load_or_default, save, KeyValueStore, KEY_ENDPOINT_CONFIG, KEY_HISTORY, KEY_SERVICE,
    KEY_USE_PROXY, KEY_VISION_CONFIG,
};
use crate::transport::{RemoteAnswer, Transport, TransportMode};

/// Prefix of every message shown for a failed send
pub const FAILURE_PREFIX: &str = "Failed to send request. ";

/// Result of a dispatched send, successful or not
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub envelope: ResponseEnvelope,
    /// User-facing message when the send failed
    pub error: Option<String>,
    /// Set when enabling proxy mode would likely help
    pub cors_hint: bool,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One scoring send: the body plus the image preview it was built from, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringInput {
    pub body: String,
    pub image_preview: Option<String>,
}

impl ScoringInput {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            image_preview: None,
        }
    }

    pub fn image(body: impl Into<String>, preview: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            image_preview: Some(preview.into()),
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn KeyValueStore>,
    transport: Transport,
    endpoint: EndpointDescriptor,
    vision: VisionDescriptor,
    use_proxy: bool,
    service: ServiceType,
    history: History,
}

impl Orchestrator {
    /// Restore a session from `store`, with a default for every missing key
    pub async fn load(store: Arc<dyn KeyValueStore>, transport: Transport) -> Self {
        let endpoint = load_or_default(store.as_ref(), KEY_ENDPOINT_CONFIG, EndpointDescriptor::default()).await;
        let vision = load_or_default(store.as_ref(), KEY_VISION_CONFIG, VisionDescriptor::default()).await;
        let use_proxy = load_or_default(store.as_ref(), KEY_USE_PROXY, true).await;
        let service = load_or_default(store.as_ref(), KEY_SERVICE, ServiceType::default()).await;
        let entries: Vec<HistoryEntry> = load_or_default(store.as_ref(), KEY_HISTORY, Vec::new()).await;

        Self {
            store,
            transport,
            endpoint,
            vision,
            use_proxy,
            service,
            history: History::from_entries(entries),
        }
    }

    // ===== SESSION STATE =====

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    pub fn vision(&self) -> &VisionDescriptor {
        &self.vision
    }

    pub fn use_proxy(&self) -> bool {
        self.use_proxy
    }

    pub fn service(&self) -> ServiceType {
        self.service
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn transport_mode(&self) -> TransportMode {
        TransportMode::from_proxy_flag(self.use_proxy)
    }

    /// Relay the session posts to in proxy mode
    pub fn relay_url(&self) -> &str {
        self.transport.relay_url()
    }

    /// Replace the scoring endpoint; persisted only once something was entered
    pub async fn set_endpoint(&mut self, endpoint: EndpointDescriptor) {
        self.endpoint = endpoint;
        if self.endpoint.has_values() {
            save(self.store.as_ref(), KEY_ENDPOINT_CONFIG, &self.endpoint).await;
        }
    }

    pub async fn set_vision(&mut self, vision: VisionDescriptor) {
        self.vision = vision;
        save(self.store.as_ref(), KEY_VISION_CONFIG, &self.vision).await;
    }

    pub async fn set_use_proxy(&mut self, use_proxy: bool) {
        self.use_proxy = use_proxy;
        save(self.store.as_ref(), KEY_USE_PROXY, &self.use_proxy).await;
    }

    pub async fn set_service(&mut self, service: ServiceType) {
        self.service = service;
        save(self.store.as_ref(), KEY_SERVICE, &self.service).await;
    }

    pub async fn clear_history(&mut self) {
        self.history.clear();
        self.save_history().await;
    }

    async fn save_history(&self) {
        save(self.store.as_ref(), KEY_HISTORY, &self.history.to_vec()).await;
    }

    // ===== SENDING =====

    /// Send a scoring request and record it in history.
    ///
    /// Precondition failures return `Err` without dispatching anything. Once
    /// dispatched, failures are folded into the returned outcome.
    pub async fn send_scoring(&mut self, input: ScoringInput) -> Result<SendOutcome> {
        self.endpoint.ensure_configured()?;
        if serde_json::from_str::<Value>(&input.body).is_err() {
            return Err(OrchestratorError::validation(
                "requestBody",
                "Invalid JSON in request body",
            ));
        }

        let descriptor = RequestDescriptor::scoring(&self.endpoint, input.body.clone());
        let mode = self.transport_mode();
        let outcome = self.dispatch(mode, &descriptor).await;

        let entry = HistoryEntry::new(
            self.endpoint.url.clone(),
            input.body,
            &outcome.envelope,
            input.image_preview.is_some(),
            input.image_preview,
        );
        self.history.push(entry);
        self.save_history().await;

        Ok(outcome)
    }

    /// Run a Vision analysis through the relay. Analyses are not recorded in
    /// history.
    pub async fn analyze_image(&mut self, image: Option<ImageRef>) -> Result<SendOutcome> {
        self.vision.ensure_configured()?;
        self.vision.validate_options()?;

        let image = match image {
            Some(ImageRef::Url(url)) if !url.trim().is_empty() => ImageRef::Url(url),
            Some(ImageRef::InlineBase64(data)) if !data.trim().is_empty() => {
                ImageRef::InlineBase64(data)
            }
            _ => {
                return Err(OrchestratorError::MissingImage(
                    "No image provided. Please upload an image or provide a URL.".to_string(),
                ))
            }
        };

        let descriptor = RequestDescriptor::vision(&self.vision, image);
        Ok(self.dispatch(TransportMode::Proxy, &descriptor).await)
    }

    async fn dispatch(&self, mode: TransportMode, descriptor: &RequestDescriptor) -> SendOutcome {
        let service = descriptor.service_type();
        let started = Instant::now();
        let result = self.transport.send(mode, descriptor).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(RemoteAnswer { data, status }) => {
                info!(service = %service, status = status, duration_ms = duration_ms, "Request completed");
                SendOutcome {
                    envelope: ResponseEnvelope::new(data, status, duration_ms),
                    error: None,
                    cors_hint: false,
                }
            }
            Err(err) => {
                let message = format!("{}{}", FAILURE_PREFIX, err);
                warn!(service = %service, error = %err, duration_ms = duration_ms, "Request failed");
                SendOutcome {
                    envelope: ResponseEnvelope::failure(message.clone(), err.status_code(), duration_ms),
                    error: Some(message),
                    cors_hint: err.is_likely_cors(),
                }
            }
        }
    }
}
