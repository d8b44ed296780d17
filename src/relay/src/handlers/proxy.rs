//! Relay handler
//!
//! Accepts one flat relay request, validates it into a [`RequestDescriptor`],
//! performs the outbound call and answers `{ data, status }` or a JSON error.

use std::convert::TryFrom;
use std::time::Instant;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::{info, warn};

use ml_tester_shared::types::api::{RelayRequest, RelayResponse};
use ml_tester_shared::RequestDescriptor;

use crate::error::{ApiError, Result};
use crate::services::metrics::{
    OUTCOME_FAILED, OUTCOME_REJECTED, OUTCOME_REMOTE_ERROR, OUTCOME_SUCCESS,
};
use crate::state::AppState;

/// Forward a scoring or Vision request
pub async fn relay(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Json<RelayResponse>> {
    let service = match &payload {
        Ok(Json(request)) if request.is_vision() => "vision",
        Ok(_) => "ml-studio",
        Err(_) => "unknown",
    };

    let descriptor = match payload
        .map_err(ApiError::from)
        .and_then(|Json(request)| RequestDescriptor::try_from(request).map_err(ApiError::from))
    {
        Ok(descriptor) => descriptor,
        Err(err) => {
            warn!(service = service, error = %err, "Rejected relay request");
            state.metrics.record_request(service, OUTCOME_REJECTED);
            return Err(err);
        }
    };

    let started = Instant::now();
    let result = state.forwarder.forward(descriptor).await;
    let elapsed = started.elapsed();

    let outcome = match &result {
        Ok(response) if (200..300).contains(&response.status) => OUTCOME_SUCCESS,
        Ok(_) | Err(ApiError::Remote { .. }) => OUTCOME_REMOTE_ERROR,
        Err(err) if err.status_code().is_client_error() => OUTCOME_REJECTED,
        Err(_) => OUTCOME_FAILED,
    };
    state.metrics.record_request(service, outcome);
    if outcome != OUTCOME_REJECTED {
        state.metrics.record_upstream_duration(service, elapsed);
    }

    info!(
        service = service,
        outcome = outcome,
        duration_ms = elapsed.as_millis() as u64,
        "Relay request completed"
    );

    result.map(Json)
}
