//! Trial matching API handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use trialmatch_core::{render_report, stream_match, MatchEvent, TrialMatch};
use uuid::Uuid;

use super::deidentify::redact;
use super::handlers::{api_error, ApiError};
use crate::metrics::MATCH_STREAMS_ACTIVE;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub patient_text: String,
    /// Defaults to `matcher.default_max_results`.
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Run the text through the de-identifier before matching.
    #[serde(default)]
    pub deidentify: bool,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub run_id: Uuid,
    pub matches: Vec<TrialMatch>,
    pub report: String,
    pub conditions: Vec<String>,
    pub used_fallback_condition: bool,
    pub candidates_found: usize,
    pub candidates_evaluated: usize,
    pub candidates_dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_failure: Option<String>,
    pub duration_ms: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/match
///
/// Run a full match and return the ranked results with the rendered report.
pub async fn match_patient(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, ApiError> {
    let (patient_text, max_results) = prepare(&state, body).await?;

    let run = state.matcher().run(&patient_text, max_results, None).await;
    let report = render_report(&run.matches);

    Ok(Json(MatchResponse {
        run_id: run.run_id,
        duration_ms: (run.finished_at - run.started_at).num_milliseconds(),
        report,
        conditions: run.conditions,
        used_fallback_condition: run.used_fallback_condition,
        candidates_found: run.candidates_found,
        candidates_evaluated: run.candidates_evaluated,
        candidates_dropped: run.candidates_dropped,
        search_failure: run.search_failure,
        matches: run.matches,
    }))
}

/// POST /api/v1/match/stream
///
/// Run a match and stream progress as server-sent events: `status` events
/// followed by one `complete` or `error`. Closing the connection stops the
/// run at the next candidate.
pub async fn match_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MatchRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (patient_text, max_results) = prepare(&state, body).await?;
    info!(max_results, "Starting streamed match");

    let guard = StreamGuard::open();
    let events = stream_match(state.matcher(), patient_text, max_results).map(move |event| {
        let _open = &guard;
        Ok(to_sse_event(&event))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Validate the request and resolve the text actually matched.
async fn prepare(state: &AppState, body: MatchRequest) -> Result<(String, usize), ApiError> {
    if body.patient_text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No patient text provided"));
    }

    let max_results = body
        .max_results
        .unwrap_or(state.config().matcher.default_max_results);

    let patient_text = if body.deidentify {
        redact(state, &body.patient_text).await?
    } else {
        body.patient_text
    };

    Ok((patient_text, max_results))
}

fn to_sse_event(event: &MatchEvent) -> Event {
    match Event::default().event(event.event_name()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            error!(error = %e, "Failed to encode progress event");
            Event::default()
                .event("error")
                .data(format!("Failed to encode progress event: {}", e))
        }
    }
}

/// Tracks an open progress stream for the lifetime of the response body.
struct StreamGuard;

impl StreamGuard {
    fn open() -> Self {
        MATCH_STREAMS_ACTIVE.inc();
        Self
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        MATCH_STREAMS_ACTIVE.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_request_defaults() {
        let req: MatchRequest = serde_json::from_str(r#"{"patient_text": "x"}"#).unwrap();
        assert_eq!(req.max_results, None);
        assert!(!req.deidentify);
    }

    #[test]
    fn test_stream_guard_tracks_open_streams() {
        let before = MATCH_STREAMS_ACTIVE.get();
        let guard = StreamGuard::open();
        assert_eq!(MATCH_STREAMS_ACTIVE.get(), before + 1);
        drop(guard);
        assert_eq!(MATCH_STREAMS_ACTIVE.get(), before);
    }
}
