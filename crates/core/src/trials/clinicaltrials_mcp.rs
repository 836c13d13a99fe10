//! ClinicalTrials.gov trial source over an MCP tool-call endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::event_stream::decode_tool_payload;
use super::types::{
    SourceHealth, TrialDetail, TrialSource, TrialSourceError, CONTACT_NOT_AVAILABLE,
};
use crate::config::ClinicalTrialsMcpConfig;
use crate::metrics;

const SOURCE_NAME: &str = "clinical_trials_mcp";

/// Trial source backed by the ClinicalTrials.gov MCP server.
pub struct ClinicalTrialsMcpSource {
    client: reqwest::Client,
    url: String,
    status_filter: String,
    timeout: Duration,
    next_request_id: AtomicU64,
}

impl ClinicalTrialsMcpSource {
    pub fn new(config: &ClinicalTrialsMcpConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            status_filter: config.status_filter.clone(),
            timeout: Duration::from_secs(u64::from(config.timeout_secs)),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Invoke one tool and return its decoded output.
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, TrialSourceError> {
        let request = ToolCallRequest {
            jsonrpc: "2.0",
            method: "tools/call",
            params: ToolCallParams {
                name: tool,
                arguments,
            },
            id: self.next_request_id.fetch_add(1, Ordering::Relaxed),
        };

        debug!(tool = tool, id = request.id, url = %self.url, "Calling MCP tool");
        let started = Instant::now();

        let result = self.send(&request).await;

        metrics::TRIAL_SOURCE_DURATION
            .with_label_values(&[SOURCE_NAME, tool])
            .observe(started.elapsed().as_secs_f64());
        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::TRIAL_SOURCE_REQUESTS
            .with_label_values(&[SOURCE_NAME, tool, status])
            .inc();

        result
    }

    async fn send(&self, request: &ToolCallRequest<'_>) -> Result<Value, TrialSourceError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_request_error)?;

        if status != 200 {
            if status == 502 {
                warn!("MCP server returned 502, it may be cold-starting");
            }
            return Err(TrialSourceError::Status {
                status,
                body: preview(&body),
            });
        }

        decode_tool_payload(&body)
    }

    fn list_studies_arguments(&self, conditions: &[String], limit: usize) -> Value {
        json!({
            "cond": conditions.join(" "),
            "term": "",
            "locn": "",
            "overallStatus": self.status_filter,
            "pageSize": limit,
            "format": "json",
            "countTotal": "true",
            "pageToken": "",
        })
    }
}

fn map_request_error(e: reqwest::Error) -> TrialSourceError {
    if e.is_timeout() {
        TrialSourceError::Timeout
    } else if e.is_connect() {
        TrialSourceError::ConnectionFailed(e.to_string())
    } else {
        TrialSourceError::ConnectionFailed(format!("Request failed: {}", e))
    }
}

fn preview(body: &str) -> String {
    const LIMIT: usize = 500;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait]
impl TrialSource for ClinicalTrialsMcpSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(
        &self,
        conditions: &[String],
        limit: usize,
    ) -> Result<Vec<String>, TrialSourceError> {
        let payload = self
            .call_tool("list_studies", self.list_studies_arguments(conditions, limit))
            .await?;

        let list: StudyList = serde_json::from_value(payload)
            .map_err(|e| TrialSourceError::PayloadDecode(e.to_string()))?;

        let mut ids: Vec<String> = list
            .studies
            .iter()
            .filter_map(|study| {
                study
                    .pointer("/protocolSection/identificationModule/nctId")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect();
        ids.truncate(limit);

        info!(
            total_count = list.total_count.unwrap_or_default(),
            returned = ids.len(),
            "ClinicalTrials.gov search complete"
        );
        Ok(ids)
    }

    async fn fetch(&self, trial_id: &str) -> Result<Option<TrialDetail>, TrialSourceError> {
        let payload = self
            .call_tool("get_study", json!({ "nct_id": trial_id }))
            .await?;
        Ok(Some(study_to_detail(trial_id, &payload)))
    }

    async fn health(&self) -> SourceHealth {
        let started = Instant::now();
        let result = self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        let latency_ms = Some(started.elapsed().as_millis() as u64);

        let (online, detail) = match result {
            Ok(response) => classify_health_status(response.status().as_u16()),
            Err(e) if e.is_timeout() => (false, "timed out".to_string()),
            Err(e) => (false, format!("connection failed: {}", e)),
        };

        SourceHealth {
            source: SOURCE_NAME.to_string(),
            online,
            detail,
            latency_ms,
        }
    }
}

/// Map a plain GET status to an online verdict.
///
/// A 406 means the server is up but wants an event-stream Accept header.
pub fn classify_health_status(status: u16) -> (bool, String) {
    match status {
        200 => (true, "HTTP 200".to_string()),
        406 => (true, "HTTP 406 (server up, expects MCP client)".to_string()),
        502 => (false, "HTTP 502 (cold-starting or down)".to_string()),
        s if s < 500 => (true, format!("HTTP {}", s)),
        s => (false, format!("HTTP {}", s)),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ToolCallRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: ToolCallParams<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct ToolCallParams<'a> {
    name: &'a str,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudyList {
    #[serde(default)]
    total_count: Option<u64>,
    #[serde(default)]
    studies: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudyRecord {
    protocol_section: Option<ProtocolSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProtocolSection {
    identification_module: IdentificationModule,
    status_module: StatusModule,
    description_module: DescriptionModule,
    eligibility_module: EligibilityModule,
    contacts_locations_module: ContactsLocationsModule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IdentificationModule {
    brief_title: Option<String>,
    official_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StatusModule {
    overall_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DescriptionModule {
    brief_summary: Option<String>,
    detailed_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EligibilityModule {
    eligibility_criteria: Option<String>,
    minimum_age: Option<String>,
    sex: Option<String>,
    healthy_volunteers: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContactsLocationsModule {
    #[serde(alias = "centralContacts")]
    central_contact: Vec<CentralContact>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CentralContact {
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Flatten a `get_study` payload into a [`TrialDetail`].
///
/// Payloads without a recognisable protocol section are kept as raw JSON so
/// the evaluator still sees everything that was returned.
pub(crate) fn study_to_detail(trial_id: &str, payload: &Value) -> TrialDetail {
    let protocol = serde_json::from_value::<StudyRecord>(payload.clone())
        .ok()
        .and_then(|record| record.protocol_section);

    let Some(protocol) = protocol else {
        let full_text = match payload {
            Value::Object(_) => {
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return TrialDetail {
            trial_id: trial_id.to_string(),
            trial_name: "Unknown".to_string(),
            contact_info: CONTACT_NOT_AVAILABLE.to_string(),
            full_text,
        };
    };

    let ident = &protocol.identification_module;
    let brief_title = non_empty(&ident.brief_title);
    let official_title = non_empty(&ident.official_title);
    let trial_name = brief_title.or(official_title).unwrap_or("Unknown").to_string();

    let mut parts = vec![
        format!("TRIAL ID: {}", trial_id),
        format!("NAME: {}", trial_name),
    ];
    if let (Some(official), Some(brief)) = (official_title, brief_title) {
        if official != brief {
            parts.push(format!("OFFICIAL TITLE: {}", official));
        }
    }
    if let Some(status) = non_empty(&protocol.status_module.overall_status) {
        parts.push(format!("STATUS: {}", status));
    }

    let description = &protocol.description_module;
    if let Some(summary) = non_empty(&description.brief_summary) {
        parts.push(format!("\nBRIEF SUMMARY:\n{}", summary));
    }
    if let Some(detailed) = non_empty(&description.detailed_description) {
        parts.push(format!("\nDETAILED DESCRIPTION:\n{}", detailed));
    }

    let elig = &protocol.eligibility_module;
    if let Some(criteria) = non_empty(&elig.eligibility_criteria) {
        parts.push(format!("\nELIGIBILITY CRITERIA:\n{}", criteria));
    }
    if let Some(age) = non_empty(&elig.minimum_age) {
        parts.push(format!("MINIMUM AGE: {}", age));
    }
    if let Some(sex) = non_empty(&elig.sex) {
        parts.push(format!("SEX: {}", sex));
    }
    match &elig.healthy_volunteers {
        Some(Value::Bool(accepts)) => parts.push(format!(
            "HEALTHY VOLUNTEERS: {}",
            if *accepts { "Yes" } else { "No" }
        )),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            parts.push(format!("HEALTHY VOLUNTEERS: {}", s.trim()))
        }
        _ => {}
    }

    let contact_info = protocol
        .contacts_locations_module
        .central_contact
        .first()
        .map(|contact| {
            let mut fields = Vec::new();
            if let Some(name) = non_empty(&contact.name) {
                fields.push(name.to_string());
            }
            if let Some(phone) = non_empty(&contact.phone) {
                fields.push(format!("Phone: {}", phone));
            }
            if let Some(email) = non_empty(&contact.email) {
                fields.push(email.to_string());
            }
            fields.join(" | ")
        })
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| CONTACT_NOT_AVAILABLE.to_string());

    TrialDetail {
        trial_id: trial_id.to_string(),
        trial_name,
        contact_info,
        full_text: parts.join("\n"),
    }
}
