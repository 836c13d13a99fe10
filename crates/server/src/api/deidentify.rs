//! De-identification API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;
use trialmatch_core::DeidentifyError;

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeidentifyRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct DeidentifyResponse {
    pub text: String,
}

/// POST /api/v1/deidentify
///
/// Redact PHI from free text and return only the processed text.
pub async fn deidentify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeidentifyRequest>,
) -> Result<Json<DeidentifyResponse>, ApiError> {
    if body.text.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No text provided"));
    }

    let text = redact(&state, &body.text).await?;
    Ok(Json(DeidentifyResponse { text }))
}

/// Run `text` through the configured de-identifier.
///
/// 503 when none is configured; upstream HTTP failures keep their status.
pub(crate) async fn redact(state: &AppState, text: &str) -> Result<String, ApiError> {
    let deidentifier = state.deidentifier().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "De-identification not configured",
        )
    })?;

    deidentifier
        .deidentify(text)
        .await
        .map(|out| out.processed_text)
        .map_err(|e| {
            warn!(service = deidentifier.name(), error = %e, "De-identification request failed");
            api_error(error_status(&e), e.to_string())
        })
}

fn error_status(error: &DeidentifyError) -> StatusCode {
    match error {
        DeidentifyError::Status { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        DeidentifyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
