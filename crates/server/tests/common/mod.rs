//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock collaborators injected, so the HTTP surface can be exercised
//! without an LLM, a trial registry or a de-identification service.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use trialmatch_core::{
    load_config_from_str,
    matcher::MatcherConfig,
    testing::{MockConditionExtractor, MockDeidentifier, MockTrialEvaluator, MockTrialSource},
    Deidentifier, TrialMatcher,
};
use trialmatch_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use trialmatch_core::testing::fixtures;

/// Config used by every fixture. Secrets are present so sanitization can be checked.
pub const TEST_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 5000

[llm]
provider = "anthropic"
api_key = "sk-test-secret"

[trial_source]
backend = "static_corpus"

[trial_source.static_corpus]
path = "unused.txt"

[matcher]
default_max_results = 3

[deidentify]
url = "http://127.0.0.1:1/v1/detect/deidentify/string"
vault_id = "vault-test"
bearer_token = "bearer-test-secret"
"#;

/// Test fixture for API testing with mock collaborators.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_match() {
///     let fixture = TestFixture::builder()
///         .source(MockTrialSource::new().with_trial(fixtures::trial_detail("T1", "Trial")))
///         .build();
///
///     let response = fixture.post("/api/v1/match", json!({"patient_text": "..."})).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock trial source - inspect searches and fetches
    pub source: Arc<MockTrialSource>,
    /// Mock extractor - inspect the patient text that reached matching
    pub extractor: Arc<MockConditionExtractor>,
    /// Mock evaluator - inspect evaluated trials
    pub evaluator: Arc<MockTrialEvaluator>,
    /// Mock de-identifier, if configured
    pub deidentifier: Option<Arc<MockDeidentifier>>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Raw response, for streamed bodies
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

/// Builder for [`TestFixture`].
pub struct TestFixtureBuilder {
    extractor: MockConditionExtractor,
    evaluator: MockTrialEvaluator,
    source: MockTrialSource,
    deidentifier: Option<MockDeidentifier>,
}

impl TestFixtureBuilder {
    pub fn extractor(mut self, extractor: MockConditionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn evaluator(mut self, evaluator: MockTrialEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn source(mut self, source: MockTrialSource) -> Self {
        self.source = source;
        self
    }

    pub fn deidentifier(mut self, deidentifier: MockDeidentifier) -> Self {
        self.deidentifier = Some(deidentifier);
        self
    }

    pub fn build(self) -> TestFixture {
        let config = load_config_from_str(TEST_CONFIG).expect("Failed to parse test config");

        let source = Arc::new(self.source);
        let extractor = Arc::new(self.extractor);
        let evaluator = Arc::new(self.evaluator);
        let deidentifier = self.deidentifier.map(Arc::new);

        let matcher = Arc::new(TrialMatcher::new(
            MatcherConfig {
                default_max_results: 3,
                ..Default::default()
            },
            Arc::clone(&extractor) as _,
            Arc::clone(&evaluator) as _,
            Arc::clone(&source) as _,
        ));

        let state = Arc::new(AppState::new(
            config,
            matcher,
            deidentifier
                .clone()
                .map(|d| d as Arc<dyn Deidentifier>),
        ));

        TestFixture {
            router: create_router(state),
            source,
            extractor,
            evaluator,
            deidentifier,
        }
    }
}

impl TestFixture {
    /// Start building a fixture with an empty source and no de-identifier.
    pub fn builder() -> TestFixtureBuilder {
        TestFixtureBuilder {
            extractor: MockConditionExtractor::returning(vec!["breast cancer".to_string()]),
            evaluator: MockTrialEvaluator::new(),
            source: MockTrialSource::new(),
            deidentifier: None,
        }
    }

    /// Create a fixture with default mocks.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a request and return the body as text.
    pub async fn raw(&self, method: &str, path: &str, body: Option<Value>) -> RawResponse {
        let response = self
            .router
            .clone()
            .oneshot(build_request(method, path, body))
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            content_type,
            body: String::from_utf8_lossy(&body_bytes).into_owned(),
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let raw = self.raw(method, path, body).await;

        let body: Value = if raw.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&raw.body).unwrap_or(Value::Null)
        };

        TestResponse {
            status: raw.status,
            body,
        }
    }
}

fn build_request(method: &str, path: &str, body: Option<Value>) -> Request<Body> {
    let mut request_builder = Request::builder().method(method).uri(path);

    let body = if let Some(json_body) = body {
        request_builder = request_builder.header("Content-Type", "application/json");
        Body::from(serde_json::to_vec(&json_body).unwrap())
    } else {
        Body::empty()
    };

    request_builder.body(body).unwrap()
}
