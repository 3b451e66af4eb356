use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::files::OutputFile;

/// Outbound parameters for one `invoke agent turn` call.
///
/// Kept as an open JSON object so plugins can add vendor fields
/// (`guardrailConfiguration`, `knowledgeBases`, ...) the loop knows nothing about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvokeRequest {
    params: Map<String, Value>,
}

impl InvokeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.params.get_mut(key)
    }

    /// Set a field, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.params.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn into_params(self) -> Map<String, Value> {
        self.params
    }

    pub fn session_id(&self) -> Option<&str> {
        self.params.get("sessionId").and_then(Value::as_str)
    }

    pub fn input_text(&self) -> Option<&str> {
        self.params.get("inputText").and_then(Value::as_str)
    }

    /// Invocation id of the tool result carried by a resumption turn.
    pub fn invocation_id(&self) -> Option<&str> {
        self.params
            .get("inlineSessionState")
            .and_then(|s| s.get("invocationId"))
            .and_then(Value::as_str)
    }

    /// The `functionResult` objects of a resumption turn.
    pub fn function_results(&self) -> Vec<&Value> {
        self.params
            .get("inlineSessionState")
            .and_then(|s| s.get("returnControlInvocationResults"))
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| r.get("functionResult"))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for InvokeRequest {
    fn from(params: Map<String, Value>) -> Self {
        Self { params }
    }
}

/// What came back from one remote call, in stream order.
#[derive(Debug, Clone, Default)]
pub struct InvokeResponse {
    pub events: Vec<ResponseEvent>,
}

impl InvokeResponse {
    pub fn new(events: Vec<ResponseEvent>) -> Self {
        Self { events }
    }
}

#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A decoded text chunk.
    Chunk(String),
    /// The remote model wants a local function called.
    ReturnControl(ReturnControl),
    /// Files produced remotely (e.g. by the code interpreter).
    Files(Vec<OutputFile>),
    /// Diagnostic trace payload, passed through untouched.
    Trace(Value),
}

/// A tool-call request issued by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnControl {
    pub invocation_id: String,
    #[serde(default)]
    pub invocation_inputs: Vec<InvocationInput>,
}

impl ReturnControl {
    /// Only the first function invocation of a request is served.
    pub fn function(&self) -> Option<&FunctionInvocation> {
        self.invocation_inputs
            .iter()
            .find_map(|i| i.function_invocation_input.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationInput {
    #[serde(default)]
    pub function_invocation_input: Option<FunctionInvocation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocation {
    #[serde(default)]
    pub action_group: String,
    pub function: String,
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
}

/// One stringly-typed argument as sent by the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,
}

fn default_param_type() -> String {
    "string".into()
}

impl FunctionParameter {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        param_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            param_type: param_type.into(),
        }
    }
}

/// A local tool's output, tagged for submission back to the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResult {
    pub action_group: String,
    pub function: String,
    /// JSON-serialized return value of the tool.
    pub body: String,
}

impl FunctionResult {
    pub fn to_wire(&self) -> Value {
        json!({
            "functionResult": {
                "actionGroup": self.action_group,
                "function": self.function,
                "responseBody": {
                    "application/json": {
                        "body": self.body,
                    }
                }
            }
        })
    }
}

/// Input for a single turn. Exactly one of user text or a tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    UserText(String),
    ToolResult {
        invocation_id: String,
        result: FunctionResult,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A role-tagged conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_result_wire_shape() {
        let result = FunctionResult {
            action_group: "WeatherActions".into(),
            function: "get_weather".into(),
            body: r#"{"temp":21}"#.into(),
        };
        let wire = result.to_wire();
        assert_eq!(wire["functionResult"]["actionGroup"], "WeatherActions");
        assert_eq!(wire["functionResult"]["function"], "get_weather");
        assert_eq!(
            wire["functionResult"]["responseBody"]["application/json"]["body"],
            r#"{"temp":21}"#
        );
    }

    #[test]
    fn return_control_picks_function_input() {
        let rc: ReturnControl = serde_json::from_value(json!({
            "invocationId": "inv-1",
            "invocationInputs": [{
                "functionInvocationInput": {
                    "actionGroup": "MathActions",
                    "function": "add",
                    "parameters": [
                        {"name": "a", "value": "1", "type": "number"},
                        {"name": "b", "value": "2"}
                    ]
                }
            }]
        }))
        .unwrap();

        let f = rc.function().unwrap();
        assert_eq!(rc.invocation_id, "inv-1");
        assert_eq!(f.function, "add");
        assert_eq!(f.parameters.len(), 2);
        assert_eq!(f.parameters[1].param_type, "string");
    }

    #[test]
    fn request_accessors() {
        let mut req = InvokeRequest::new();
        req.insert("sessionId", json!("s-1"));
        req.insert(
            "inlineSessionState",
            json!({
                "invocationId": "inv-9",
                "returnControlInvocationResults": [{"functionResult": {"function": "f"}}]
            }),
        );
        assert_eq!(req.session_id(), Some("s-1"));
        assert_eq!(req.input_text(), None);
        assert_eq!(req.invocation_id(), Some("inv-9"));
        assert_eq!(req.function_results()[0]["function"], "f");
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let v = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(v["role"], "assistant");
    }
}
