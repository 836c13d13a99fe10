//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Matching runs (outcomes, duration, candidates, verdicts)
//! - External services (trial sources, reasoning oracle, de-identification)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Matching Runs
// =============================================================================

/// Matching runs total by result.
pub static MATCH_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trialmatch_match_runs_total", "Total matching runs"),
        &["result"], // "matched", "no_matches", "no_candidates", "cancelled"
    )
    .unwrap()
});

/// Matching run duration in seconds.
pub static MATCH_RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "trialmatch_match_run_duration_seconds",
            "Duration of a full matching run",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"],
    )
    .unwrap()
});

/// Candidates returned by the trial source per run.
pub static CANDIDATES_FOUND: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "trialmatch_candidates_found",
            "Number of candidate trials found per run",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 40.0, 100.0]),
    )
    .unwrap()
});

/// Per-trial verdict outcomes.
pub static VERDICTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trialmatch_verdicts_total", "Per-trial evaluation outcomes"),
        // "qualified", "not_qualified", "needs_more_info", "dropped", "skipped"
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Trial source requests total.
pub static TRIAL_SOURCE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trialmatch_trial_source_requests_total",
            "Total trial source requests",
        ),
        &["source", "operation", "status"], // status: "success" or an error kind
    )
    .unwrap()
});

/// Trial source request duration.
pub static TRIAL_SOURCE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "trialmatch_trial_source_duration_seconds",
            "Duration of trial source calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["source", "operation"],
    )
    .unwrap()
});

/// Oracle requests total.
pub static LLM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trialmatch_llm_requests_total", "Total LLM requests"),
        &["provider", "purpose", "status"], // purpose: "extraction", "evaluation"
    )
    .unwrap()
});

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trialmatch_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

/// De-identification requests total.
pub static DEIDENTIFY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trialmatch_deidentify_requests_total",
            "Total de-identification requests",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record token usage for one oracle response.
pub fn record_llm_usage(provider: &str, usage: &crate::matcher::LlmUsage) {
    LLM_TOKENS
        .with_label_values(&[provider, "input"])
        .inc_by(u64::from(usage.input_tokens));
    LLM_TOKENS
        .with_label_values(&[provider, "output"])
        .inc_by(u64::from(usage.output_tokens));
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Matching
        Box::new(MATCH_RUNS.clone()),
        Box::new(MATCH_RUN_DURATION.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        Box::new(VERDICTS.clone()),
        // External services
        Box::new(TRIAL_SOURCE_REQUESTS.clone()),
        Box::new(TRIAL_SOURCE_DURATION.clone()),
        Box::new(LLM_REQUESTS.clone()),
        Box::new(LLM_TOKENS.clone()),
        Box::new(DEIDENTIFY_REQUESTS.clone()),
    ]
}
