//! Decoding of tool-call responses framed as server-sent events.
//!
//! The remote service answers with lines like:
//!
//! ```text
//! event: message
//! data: {"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"{\"studies\":[]}"}]}}
//! ```
//!
//! The tool output sits JSON-encoded inside `result.content[0].text`, so the
//! payload is decoded twice.

use serde::Deserialize;
use serde_json::Value;

use super::types::TrialSourceError;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<ToolResult>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct ToolResult {
    #[serde(default)]
    content: Vec<ToolContent>,
}

#[derive(Debug, Deserialize)]
struct ToolContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Return the value of the first `data:` line, if any.
pub fn find_data_line(body: &str) -> Option<&str> {
    body.lines().find_map(|line| {
        let value = line.trim_end_matches('\r').strip_prefix("data:")?;
        Some(value.strip_prefix(' ').unwrap_or(value))
    })
}

/// Locate the payload event and decode the tool output it carries.
pub fn decode_tool_payload(body: &str) -> Result<Value, TrialSourceError> {
    let data = find_data_line(body).ok_or(TrialSourceError::MissingPayload)?;

    let envelope: RpcResponse = serde_json::from_str(data)
        .map_err(|e| TrialSourceError::MalformedEnvelope(e.to_string()))?;

    if let Some(err) = envelope.error {
        return Err(TrialSourceError::MalformedEnvelope(format!(
            "rpc error {}: {}",
            err.code, err.message
        )));
    }

    let text = envelope
        .result
        .ok_or_else(|| TrialSourceError::MalformedEnvelope("no result".to_string()))?
        .content
        .into_iter()
        .next()
        .ok_or_else(|| TrialSourceError::MalformedEnvelope("empty content".to_string()))?
        .text
        .ok_or_else(|| TrialSourceError::MalformedEnvelope("content has no text".to_string()))?;

    serde_json::from_str(&text).map_err(|e| TrialSourceError::PayloadDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(inner: &str) -> String {
        let envelope = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": inner}]}
        });
        format!("event: message\ndata: {}\n\n", envelope)
    }

    #[test]
    fn test_decode_double_encoded_payload() {
        let body = frame(r#"{"totalCount": 2, "studies": []}"#);
        let value = decode_tool_payload(&body).unwrap();
        assert_eq!(value["totalCount"], 2);
    }

    #[test]
    fn test_find_data_line_without_space() {
        assert_eq!(find_data_line("event: x\ndata:{}\n"), Some("{}"));
        assert_eq!(find_data_line("event: x\r\ndata: {}\r\n"), Some("{}"));
        assert_eq!(find_data_line("event: x\n"), None);
    }

    #[test]
    fn test_missing_data_line() {
        let err = decode_tool_payload("event: message\n\n").unwrap_err();
        assert!(matches!(err, TrialSourceError::MissingPayload));
    }

    #[test]
    fn test_malformed_envelope() {
        let err = decode_tool_payload("data: not json\n").unwrap_err();
        assert!(matches!(err, TrialSourceError::MalformedEnvelope(_)));

        let err = decode_tool_payload(r#"data: {"result":{"content":[]}}"#).unwrap_err();
        assert!(matches!(err, TrialSourceError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_rpc_error_is_reported() {
        let err =
            decode_tool_payload(r#"data: {"error":{"code":-32602,"message":"bad args"}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("bad args"));
    }

    #[test]
    fn test_inner_payload_not_json() {
        let err = decode_tool_payload(&frame("Study not found")).unwrap_err();
        assert!(matches!(err, TrialSourceError::PayloadDecode(_)));
    }
}
