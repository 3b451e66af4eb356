use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use crate::error::RuntimeError;
use crate::files::OutputFile;
use crate::types::{InvokeRequest, InvokeResponse, ResponseEvent, ReturnControl};

/// One remote `invoke agent turn` call. No state, no retries.
/// Request in, ordered event list out.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RuntimeError>;
}

/// Blanket impl so `Box<dyn AgentRuntime>` can be passed directly to `Agent::new()`.
#[async_trait]
impl AgentRuntime for Box<dyn AgentRuntime> {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RuntimeError> {
        (**self).invoke(request).await
    }
}

/// JSON-over-HTTP runtime.
///
/// POSTs the request parameters as a JSON object to `{base_url}/invoke-inline-agent`
/// and expects `{"completion": [event, ...]}` back, where each event is one of
/// `{"chunk": {"bytes": <base64>}}`, `{"returnControl": {...}}`,
/// `{"files": {"files": [...]}}` or `{"trace": {...}}`.
pub struct HttpAgentRuntime {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAgentRuntime {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Sent as a bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RuntimeError> {
        let url = format!(
            "{}/invoke-inline-agent",
            self.base_url.trim_end_matches('/')
        );
        debug!(%url, session_id = ?request.session_id(), "invoking remote agent");

        let mut req = self
            .client
            .post(url)
            .header("content-type", "application/json");
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .json(&request)
            .send()
            .await
            .map_err(|e| RuntimeError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| RuntimeError::Request(e.to_string()))?;

        if status != 200 {
            return Err(RuntimeError::ApiError { status, body: text });
        }

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| RuntimeError::Parse(e.to_string()))?;
        parse_completion(&parsed)
    }
}

/// Decode a `{"completion": [...]}` body into typed events, keeping order.
pub fn parse_completion(body: &Value) -> Result<InvokeResponse, RuntimeError> {
    let raw = body["completion"]
        .as_array()
        .ok_or_else(|| RuntimeError::Parse("missing 'completion' event list".into()))?;

    let mut events = Vec::with_capacity(raw.len());
    for event in raw {
        if let Some(rc) = event.get("returnControl") {
            let rc: ReturnControl = serde_json::from_value(rc.clone())
                .map_err(|e| RuntimeError::Parse(format!("returnControl: {e}")))?;
            events.push(ResponseEvent::ReturnControl(rc));
        } else if let Some(bytes) = event.pointer("/chunk/bytes").and_then(Value::as_str) {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(bytes)
                .map_err(|e| RuntimeError::Parse(format!("chunk bytes: {e}")))?;
            events.push(ResponseEvent::Chunk(
                String::from_utf8_lossy(&decoded).into_owned(),
            ));
        } else if let Some(files) = event.get("files") {
            let files = files["files"]
                .as_array()
                .map(|list| {
                    list.iter()
                        .map(OutputFile::from_wire)
                        .collect::<Result<Vec<_>, _>>()
                })
                .unwrap_or_else(|| Ok(Vec::new()))?;
            events.push(ResponseEvent::Files(files));
        } else if let Some(trace) = event.get("trace") {
            events.push(ResponseEvent::Trace(trace.clone()));
        } else {
            debug!(event = %event, "skipping unrecognised completion event");
        }
    }

    Ok(InvokeResponse::new(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_event_kinds_in_order() {
        let body = json!({
            "completion": [
                {"trace": {"trace": {"orchestrationTrace": {}}}},
                {"chunk": {"bytes": "SGVsbG8="}},
                {"files": {"files": [{"name": "out.txt", "bytes": "aGk=", "type": "text/plain"}]}},
                {"returnControl": {
                    "invocationId": "inv-1",
                    "invocationInputs": [{"functionInvocationInput": {
                        "actionGroup": "DefaultActions",
                        "function": "ping",
                        "parameters": []
                    }}]
                }},
                {"somethingNew": {}}
            ]
        });

        let resp = parse_completion(&body).unwrap();
        assert_eq!(resp.events.len(), 4);
        assert!(matches!(resp.events[0], ResponseEvent::Trace(_)));
        assert!(matches!(&resp.events[1], ResponseEvent::Chunk(t) if t == "Hello"));
        match &resp.events[2] {
            ResponseEvent::Files(files) => assert_eq!(files[0].content, b"hi"),
            other => panic!("expected files, got {other:?}"),
        }
        match &resp.events[3] {
            ResponseEvent::ReturnControl(rc) => {
                assert_eq!(rc.invocation_id, "inv-1");
                assert_eq!(rc.function().unwrap().function, "ping");
            }
            other => panic!("expected returnControl, got {other:?}"),
        }
    }

    #[test]
    fn missing_completion_is_parse_error() {
        let err = parse_completion(&json!({"oops": true})).unwrap_err();
        assert!(matches!(err, RuntimeError::Parse(_)));
    }

    #[test]
    fn malformed_return_control_is_parse_error() {
        let body = json!({"completion": [{"returnControl": {"invocationInputs": []}}]});
        assert!(matches!(parse_completion(&body), Err(RuntimeError::Parse(_))));
    }
}
