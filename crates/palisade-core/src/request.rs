//! Structured action requests handed to the gateway by the agent runtime.
//!
//! The gateway never parses its own configuration or owns a listener: the
//! runtime constructs these plain-data values and asks the gates for a
//! decision.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{CallerId, JobId, RequestId, Timestamp};

/// A named, parameterized action an agent asks the gateway to authorize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool the agent wants to invoke.
    pub tool_name: String,
    /// Supplied parameters, keyed by declared parameter name.
    pub parameters: BTreeMap<String, Value>,
    /// Who is asking.
    pub caller_id: CallerId,
    /// Unique per-request identifier (generated if the runtime omits it).
    #[serde(default)]
    pub request_id: RequestId,
    /// When the request was submitted; defaults to deserialization time.
    #[serde(default)]
    pub created_at: Timestamp,
}

impl ToolCall {
    /// Create a tool call with a fresh request ID and the current time.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, caller_id: CallerId) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters: BTreeMap::new(),
            caller_id,
            request_id: RequestId::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Attach a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

/// An outbound HTTP request the agent wants the egress guard to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequest {
    /// Full request URL.
    pub url: String,
    /// HTTP method (`GET`, `POST`, ...).
    pub method: String,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional request body.
    #[serde(default)]
    pub body: Option<Vec<u8>>,
    /// Caller-requested timeout; clamped to the policy ceiling.
    #[serde(default)]
    pub timeout: Option<Duration>,
    /// Who is asking.
    pub caller_id: CallerId,
    /// Background job this request belongs to, if any.
    #[serde(default)]
    pub job_id: Option<JobId>,
    /// When the request was submitted; defaults to deserialization time.
    #[serde(default)]
    pub created_at: Timestamp,
}

impl NetworkRequest {
    /// Create a GET request with a fresh timestamp.
    #[must_use]
    pub fn get(url: impl Into<String>, caller_id: CallerId) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            caller_id,
            job_id: None,
            created_at: Timestamp::now(),
        }
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the caller-requested timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// An action request submitted to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActionRequest {
    /// A tool invocation, decided by the tool-call gate.
    ToolCall(ToolCall),
    /// An outbound network request, decided by the egress guard.
    Network(NetworkRequest),
}

impl ActionRequest {
    /// The caller behind this request.
    #[must_use]
    pub fn caller_id(&self) -> &CallerId {
        match self {
            Self::ToolCall(call) => &call.caller_id,
            Self::Network(req) => &req.caller_id,
        }
    }

    /// Human-readable subject of the request (tool name or URL).
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::ToolCall(call) => &call.tool_name,
            Self::Network(req) => &req.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_builder() {
        let call = ToolCall::new("read_file", CallerId::new("agent-1"))
            .with_parameter("target_file", json!("notes.txt"));
        assert_eq!(call.tool_name, "read_file");
        assert_eq!(call.parameters["target_file"], json!("notes.txt"));
    }

    #[test]
    fn test_tool_calls_get_distinct_request_ids() {
        let a = ToolCall::new("t", CallerId::new("c"));
        let b = ToolCall::new("t", CallerId::new("c"));
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_network_request_builder() {
        let req = NetworkRequest::get("https://api.example.com/v1", CallerId::new("agent-1"))
            .with_method("POST")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(req.method, "POST");
        assert_eq!(req.timeout, Some(Duration::from_secs(5)));
        assert!(req.job_id.is_none());
    }

    #[test]
    fn test_action_request_subject() {
        let call = ActionRequest::ToolCall(ToolCall::new("read_file", CallerId::new("a")));
        assert_eq!(call.subject(), "read_file");

        let net =
            ActionRequest::Network(NetworkRequest::get("https://example.com", CallerId::new("a")));
        assert_eq!(net.subject(), "https://example.com");
        assert_eq!(net.caller_id().as_str(), "a");
    }

    #[test]
    fn test_tool_call_id_and_timestamp_generated_when_omitted() {
        // A minimal inbound document carries neither a request id nor a
        // submission time; both are filled in, not rejected.
        let minimal = r#"{"tool_name":"read_file","parameters":{},"caller_id":"agent-1"}"#;
        let first: ToolCall = serde_json::from_str(minimal).unwrap();
        let second: ToolCall = serde_json::from_str(minimal).unwrap();
        assert_eq!(first.tool_name, "read_file");
        assert_ne!(first.request_id, second.request_id);
    }

    #[test]
    fn test_network_request_created_at_defaults_when_omitted() {
        let req: NetworkRequest = serde_json::from_str(
            r#"{"url":"https://example.com/","method":"GET","caller_id":"agent-1"}"#,
        )
        .unwrap();
        assert_eq!(req.url, "https://example.com/");
        assert!(req.job_id.is_none());
        assert!(!req.created_at.is_future());
    }

    #[test]
    fn test_action_request_serialization_tag() {
        let call = ActionRequest::ToolCall(ToolCall::new("read_file", CallerId::new("a")));
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"kind\":\"tool_call\""));
        let back: ActionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subject(), "read_file");
    }
}
