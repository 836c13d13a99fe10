//! Matching coordinator: extraction, retrieval, evaluation and ranking.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::condition_extractor::{ConditionExtractorConfig, LlmConditionExtractor};
use super::config::MatcherConfig;
use super::evaluator::{LlmTrialEvaluator, TrialEvaluatorConfig};
use super::llm::create_llm_client;
use super::progress::ProgressSink;
use super::traits::{ConditionExtractor, MatcherError, TrialEvaluator};
use super::types::{MatchRun, TrialMatch};
use crate::config::Config;
use crate::metrics;
use crate::trials::{create_trial_source, TrialDetail, TrialSource};

/// Matches a patient record against a trial source.
///
/// Candidates are evaluated one at a time in retrieval order. Failures for
/// a single candidate skip that candidate; a failed search yields an empty
/// result. Neither ends the run early.
pub struct TrialMatcher {
    config: MatcherConfig,
    extractor: Arc<dyn ConditionExtractor>,
    evaluator: Arc<dyn TrialEvaluator>,
    source: Arc<dyn TrialSource>,
}

impl TrialMatcher {
    pub fn new(
        config: MatcherConfig,
        extractor: Arc<dyn ConditionExtractor>,
        evaluator: Arc<dyn TrialEvaluator>,
        source: Arc<dyn TrialSource>,
    ) -> Self {
        Self {
            config,
            extractor,
            evaluator,
            source,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// The trial source candidates are drawn from.
    pub fn source(&self) -> &Arc<dyn TrialSource> {
        &self.source
    }

    /// Match a patient and return only the ranked matches.
    pub async fn match_patient(
        &self,
        patient_text: &str,
        max_results: usize,
        progress: Option<&ProgressSink>,
    ) -> Vec<TrialMatch> {
        self.run(patient_text, max_results, progress).await.matches
    }

    /// Full matching run with diagnostics.
    ///
    /// Returns at most `max_results` matches sorted by confidence, highest
    /// first; ties keep retrieval order.
    pub async fn run(
        &self,
        patient_text: &str,
        max_results: usize,
        progress: Option<&ProgressSink>,
    ) -> MatchRun {
        let started = Instant::now();
        let mut run = MatchRun::new(Utc::now());
        info!(
            run_id = %run.run_id,
            max_results,
            source = self.source.name(),
            "Starting matching run"
        );

        if max_results == 0 {
            return self.finish(run, started);
        }

        // Step 1: conditions
        emit(progress, "[Step 1/4] Analyzing patient data to identify conditions...").await;
        let mut conditions = match self.extractor.extract(patient_text).await {
            Ok(conditions) => conditions,
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "Condition extraction failed");
                Vec::new()
            }
        };
        if conditions.is_empty() {
            warn!(
                run_id = %run.run_id,
                fallback = %self.config.fallback_condition,
                "No conditions extracted, using fallback search term"
            );
            conditions = vec![self.config.fallback_condition.clone()];
            run.used_fallback_condition = true;
        }
        run.conditions = conditions;

        // Step 2: candidates
        emit(
            progress,
            format!(
                "[Step 2/4] Searching {} for: {}...",
                self.source.name(),
                run.conditions.join(", ")
            ),
        )
        .await;
        let limit = self.config.candidate_limit(max_results);
        let mut candidates = match self.source.search(&run.conditions, limit).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "Trial search failed");
                run.search_failure = Some(e.to_string());
                Vec::new()
            }
        };
        run.candidates_found = candidates.len();
        metrics::CANDIDATES_FOUND.observe(candidates.len() as f64);

        if candidates.is_empty() {
            let message = match &run.search_failure {
                Some(reason) => format!("[Step 2/4] Trial search failed: {}", reason),
                None => "[Step 2/4] No candidate trials found".to_string(),
            };
            emit(progress, message).await;
            return self.finish(run, started);
        }

        if candidates.len() > self.config.max_evaluations {
            debug!(
                run_id = %run.run_id,
                found = candidates.len(),
                ceiling = self.config.max_evaluations,
                "Capping candidates at evaluation ceiling"
            );
            candidates.truncate(self.config.max_evaluations);
        }
        emit(
            progress,
            format!("[Step 3/4] Found {} candidate trials", candidates.len()),
        )
        .await;

        // Step 4: evaluate, one at a time
        let total = candidates.len();
        let mut matches = Vec::new();
        for (i, trial_id) in candidates.iter().enumerate() {
            if progress.is_some_and(ProgressSink::is_closed) {
                info!(run_id = %run.run_id, evaluated = i, "Caller disconnected, stopping run");
                run.cancelled = true;
                break;
            }

            emit(
                progress,
                format!("[Step 4/4] Evaluating trial {}/{}: {}...", i + 1, total, trial_id),
            )
            .await;

            let Some(trial) = self.fetch_candidate(&run, trial_id).await else {
                run.candidates_dropped += 1;
                metrics::VERDICTS.with_label_values(&["skipped"]).inc();
                emit(progress, format!("Skipped {}: trial details unavailable", trial_id)).await;
                continue;
            };

            run.candidates_evaluated += 1;
            match self.evaluator.evaluate(patient_text, &trial).await {
                Ok(m) => {
                    metrics::VERDICTS
                        .with_label_values(&[m.match_status.metric_label()])
                        .inc();
                    emit(
                        progress,
                        format!(
                            "Evaluated {}: {} ({:.0}% confidence)",
                            trial_id,
                            m.match_status,
                            m.confidence_score * 100.0
                        ),
                    )
                    .await;
                    matches.push(m);
                }
                Err(e) => {
                    warn!(run_id = %run.run_id, trial_id = %trial_id, error = %e, "Dropping trial");
                    run.candidates_dropped += 1;
                    metrics::VERDICTS.with_label_values(&["dropped"]).inc();
                    emit(progress, format!("Could not evaluate {}", trial_id)).await;
                }
            }
        }

        // Stable: equal scores keep retrieval order
        matches.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
        matches.truncate(max_results);
        run.matches = matches;

        self.finish(run, started)
    }

    async fn fetch_candidate(&self, run: &MatchRun, trial_id: &str) -> Option<TrialDetail> {
        match self.source.fetch(trial_id).await {
            Ok(Some(trial)) => Some(trial),
            Ok(None) => {
                warn!(run_id = %run.run_id, trial_id = %trial_id, "Trial not found in source");
                None
            }
            Err(e) => {
                warn!(
                    run_id = %run.run_id,
                    trial_id = %trial_id,
                    error = %e,
                    "Failed to fetch trial"
                );
                None
            }
        }
    }

    fn finish(&self, mut run: MatchRun, started: Instant) -> MatchRun {
        run.finished_at = Utc::now();
        let result = run.result_label();
        metrics::MATCH_RUNS.with_label_values(&[result]).inc();
        metrics::MATCH_RUN_DURATION
            .with_label_values(&[result])
            .observe(started.elapsed().as_secs_f64());
        info!(
            run_id = %run.run_id,
            result,
            candidates = run.candidates_found,
            evaluated = run.candidates_evaluated,
            dropped = run.candidates_dropped,
            matches = run.matches.len(),
            "Matching run finished"
        );
        run
    }
}

async fn emit(progress: Option<&ProgressSink>, message: impl Into<String>) {
    if let Some(sink) = progress {
        sink.status(message).await;
    }
}

/// Build a [`TrialMatcher`] from configuration.
///
/// Fails before any work starts when oracle credentials are missing or the
/// static corpus cannot be read.
pub fn create_trial_matcher(config: &Config) -> Result<TrialMatcher, MatcherError> {
    let llm = create_llm_client(&config.llm)?;
    let source = create_trial_source(&config.trial_source)?;

    let extractor = LlmConditionExtractor::with_config(
        llm.clone(),
        ConditionExtractorConfig {
            max_tokens: config.matcher.extraction_max_tokens,
            temperature: config.matcher.extraction_temperature,
        },
    );
    let evaluator = LlmTrialEvaluator::with_config(
        llm,
        TrialEvaluatorConfig {
            max_tokens: config.matcher.evaluation_max_tokens,
            temperature: config.matcher.evaluation_temperature,
        },
    );

    info!(
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        source = source.name(),
        "Trial matcher ready"
    );

    Ok(TrialMatcher::new(
        config.matcher.clone(),
        Arc::new(extractor),
        Arc::new(evaluator),
        source,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::types::MatchStatus;
    use crate::testing::{fixtures, MockConditionExtractor, MockTrialEvaluator, MockTrialSource};

    fn matcher(
        extractor: MockConditionExtractor,
        evaluator: MockTrialEvaluator,
        source: MockTrialSource,
    ) -> TrialMatcher {
        TrialMatcher::new(
            MatcherConfig::default(),
            Arc::new(extractor),
            Arc::new(evaluator),
            Arc::new(source),
        )
    }

    #[tokio::test]
    async fn test_empty_extraction_uses_fallback() {
        let source = Arc::new(MockTrialSource::new());
        let matcher = TrialMatcher::new(
            MatcherConfig::default(),
            Arc::new(MockConditionExtractor::returning(vec![])),
            Arc::new(MockTrialEvaluator::new()),
            source.clone(),
        );

        let run = matcher.run("patient", 5, None).await;
        assert!(run.used_fallback_condition);
        assert_eq!(run.conditions, vec!["clinical trial"]);
        assert!(run.matches.is_empty());

        let searches = source.recorded_searches();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].0, vec!["clinical trial"]);
        assert_eq!(searches[0].1, 10);
    }

    #[tokio::test]
    async fn test_extraction_error_uses_fallback() {
        let matcher = matcher(
            MockConditionExtractor::failing(),
            MockTrialEvaluator::new(),
            MockTrialSource::new(),
        );
        let run = matcher.run("patient", 5, None).await;
        assert!(run.used_fallback_condition);
    }

    #[tokio::test]
    async fn test_search_failure_yields_empty_result() {
        let matcher = matcher(
            MockConditionExtractor::returning(vec!["asthma".to_string()]),
            MockTrialEvaluator::new(),
            MockTrialSource::new().with_search_error(),
        );
        let run = matcher.run("patient", 5, None).await;
        assert!(run.matches.is_empty());
        assert!(run.search_failure.is_some());
        assert_eq!(run.result_label(), "no_candidates");
    }

    #[tokio::test]
    async fn test_sorted_truncated_and_skips() {
        let source = MockTrialSource::new()
            .with_trial(fixtures::trial_detail("A", "Trial A"))
            .with_missing_trial("GONE")
            .with_trial(fixtures::trial_detail("B", "Trial B"))
            .with_trial(fixtures::trial_detail("C", "Trial C"))
            .with_trial(fixtures::trial_detail("D", "Trial D"));
        let evaluator = MockTrialEvaluator::new()
            .with_verdict("A", MatchStatus::NotQualified, 0.2)
            .with_verdict("B", MatchStatus::Qualified, 0.8)
            .with_failure("C")
            .with_verdict("D", MatchStatus::NeedsMoreInfo, 0.8);
        let matcher = matcher(
            MockConditionExtractor::returning(vec!["x".to_string()]),
            evaluator,
            source,
        );

        let run = matcher.run("patient", 2, None).await;
        let ids: Vec<&str> = run.matches.iter().map(|m| m.trial_id.as_str()).collect();
        // B and D tie at 0.8; B was retrieved first
        assert_eq!(ids, vec!["B", "D"]);
        assert_eq!(run.candidates_found, 5);
        assert_eq!(run.candidates_evaluated, 4);
        assert_eq!(run.candidates_dropped, 2);
    }

    #[tokio::test]
    async fn test_fetch_error_skips_only_that_candidate() {
        let source = Arc::new(
            MockTrialSource::new()
                .with_trial(fixtures::trial_detail("A", "Trial A"))
                .with_fetch_error("BROKEN")
                .with_trial(fixtures::trial_detail("B", "Trial B")),
        );
        let evaluator = Arc::new(
            MockTrialEvaluator::new()
                .with_verdict("A", MatchStatus::Qualified, 0.6)
                .with_verdict("B", MatchStatus::Qualified, 0.7),
        );
        let matcher = TrialMatcher::new(
            MatcherConfig::default(),
            Arc::new(MockConditionExtractor::returning(vec!["x".to_string()])),
            evaluator.clone(),
            source.clone(),
        );

        let run = matcher.run("patient", 5, None).await;
        let ids: Vec<&str> = run.matches.iter().map(|m| m.trial_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(run.candidates_found, 3);
        assert_eq!(run.candidates_evaluated, 2);
        assert_eq!(run.candidates_dropped, 1);
        assert!(!run.cancelled);
        assert_eq!(source.recorded_fetches(), vec!["A", "BROKEN", "B"]);
        assert_eq!(evaluator.evaluated_ids(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_evaluation_ceiling() {
        let mut source = MockTrialSource::new();
        for i in 0..10 {
            source = source.with_trial(fixtures::trial_detail(&format!("T{i}"), "Trial"));
        }
        let evaluator = Arc::new(
            MockTrialEvaluator::new().with_default_verdict(MatchStatus::Qualified, 0.5),
        );
        let matcher = TrialMatcher::new(
            MatcherConfig {
                max_evaluations: 3,
                ..Default::default()
            },
            Arc::new(MockConditionExtractor::returning(vec!["x".to_string()])),
            evaluator.clone(),
            Arc::new(source),
        );

        let run = matcher.run("patient", 10, None).await;
        assert_eq!(run.candidates_found, 10);
        assert_eq!(run.candidates_evaluated, 3);
        assert_eq!(evaluator.evaluated_ids(), vec!["T0", "T1", "T2"]);
    }

    #[tokio::test]
    async fn test_zero_max_results_does_no_work() {
        let source = Arc::new(MockTrialSource::new());
        let matcher = TrialMatcher::new(
            MatcherConfig::default(),
            Arc::new(MockConditionExtractor::returning(vec!["x".to_string()])),
            Arc::new(MockTrialEvaluator::new()),
            source.clone(),
        );
        let matches = matcher.match_patient("patient", 0, None).await;
        assert!(matches.is_empty());
        assert!(source.recorded_searches().is_empty());
    }

    #[tokio::test]
    async fn test_progress_messages() {
        let source = MockTrialSource::new().with_trial(fixtures::trial_detail("T1", "Trial"));
        let matcher = matcher(
            MockConditionExtractor::returning(vec![
                "breast cancer".to_string(),
                "stage II".to_string(),
            ]),
            MockTrialEvaluator::new().with_verdict("T1", MatchStatus::Qualified, 0.9),
            source,
        );
        let (sink, mut rx) = ProgressSink::channel();

        let matches = matcher.match_patient("patient", 5, Some(&sink)).await;
        assert_eq!(matches.len(), 1);
        drop(sink);

        let mut messages = Vec::new();
        while let Some(event) = rx.recv().await {
            if let crate::matcher::MatchEvent::Status { message } = event {
                messages.push(message);
            }
        }
        assert_eq!(
            messages[0],
            "[Step 1/4] Analyzing patient data to identify conditions..."
        );
        assert_eq!(
            messages[1],
            "[Step 2/4] Searching mock for: breast cancer, stage II..."
        );
        assert!(messages.contains(&"[Step 4/4] Evaluating trial 1/1: T1...".to_string()));
        assert!(messages.last().unwrap().contains("QUALIFIED (90% confidence)"));
    }

    #[tokio::test]
    async fn test_closed_progress_cancels_run() {
        let mut source = MockTrialSource::new();
        for i in 0..3 {
            source = source.with_trial(fixtures::trial_detail(&format!("T{i}"), "Trial"));
        }
        let evaluator = Arc::new(
            MockTrialEvaluator::new().with_default_verdict(MatchStatus::Qualified, 0.5),
        );
        let matcher = TrialMatcher::new(
            MatcherConfig::default(),
            Arc::new(MockConditionExtractor::returning(vec!["x".to_string()])),
            evaluator.clone(),
            Arc::new(source),
        );
        let (sink, rx) = ProgressSink::channel();
        drop(rx);

        let run = matcher.run("patient", 5, Some(&sink)).await;
        assert!(run.cancelled);
        assert!(evaluator.evaluated_ids().is_empty());
    }

    #[test]
    fn test_create_trial_matcher_requires_credentials() {
        let config = crate::config::load_config_from_str(
            r#"
[trial_source]
backend = "clinical_trials_mcp"

[trial_source.clinical_trials_mcp]
"#,
        )
        .unwrap();
        let result = create_trial_matcher(&config);
        assert!(matches!(result, Err(MatcherError::Llm(_))));
    }
}
