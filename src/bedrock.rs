//! Runtime backed by the AWS SDK `InvokeInlineAgent` operation.
//!
//! The open JSON request built by the agent loop is translated field by field
//! into the SDK's typed builders; the response event stream is drained into an
//! [`InvokeResponse`] before the loop scans it.

use async_trait::async_trait;
use aws_sdk_bedrockagentruntime as sdk;
use base64::Engine as _;
use sdk::error::DisplayErrorContext;
use sdk::primitives::Blob;
use sdk::types as wire;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::RuntimeError;
use crate::files::{OutputFile, DEFAULT_USE_CASE};
use crate::runtime::AgentRuntime;
use crate::types::{
    FunctionInvocation, FunctionParameter, InvocationInput, InvokeRequest, InvokeResponse,
    ResponseEvent, ReturnControl,
};

const DEFAULT_GUARDRAIL_VERSION: &str = "DRAFT";

pub struct BedrockAgentRuntime {
    client: sdk::Client,
}

impl BedrockAgentRuntime {
    pub fn new(client: sdk::Client) -> Self {
        Self { client }
    }

    /// Credentials and region from the default provider chain.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(sdk::Client::new(&config))
    }

    pub async fn with_region(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.into()))
            .load()
            .await;
        Self::new(sdk::Client::new(&config))
    }
}

#[async_trait]
impl AgentRuntime for BedrockAgentRuntime {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RuntimeError> {
        let mut call = self.client.invoke_inline_agent();
        for (key, value) in request.params() {
            call = match key.as_str() {
                "sessionId" => call.session_id(as_str(key, value)?),
                "instruction" => call.instruction(as_str(key, value)?),
                "foundationModel" => call.foundation_model(as_str(key, value)?),
                "inputText" => call.input_text(as_str(key, value)?),
                "enableTrace" => call.enable_trace(as_bool(key, value)?),
                "endSession" => call.end_session(as_bool(key, value)?),
                "idleSessionTTLInSeconds" => call.idle_session_ttl_in_seconds(as_i32(key, value)?),
                "customerEncryptionKeyArn" => call.customer_encryption_key_arn(as_str(key, value)?),
                "actionGroups" => call.set_action_groups(Some(action_groups(value)?)),
                "inlineSessionState" => call.inline_session_state(session_state(value)?),
                "guardrailConfiguration" => call.guardrail_configuration(guardrail(value)?),
                "knowledgeBases" => call.set_knowledge_bases(Some(knowledge_bases(value)?)),
                other => {
                    warn!(field = other, "request field not supported by the SDK runtime, dropped");
                    call
                }
            };
        }

        let mut output = call
            .send()
            .await
            .map_err(|e| RuntimeError::Request(DisplayErrorContext(&e).to_string()))?;

        let mut events = Vec::new();
        while let Some(event) = output
            .completion
            .recv()
            .await
            .map_err(|e| RuntimeError::Request(DisplayErrorContext(&e).to_string()))?
        {
            if let Some(event) = convert_event(event) {
                events.push(event);
            }
        }
        debug!(events = events.len(), "drained completion stream");
        Ok(InvokeResponse::new(events))
    }
}

// --- Request translation ---

fn invalid(field: &str, message: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::InvalidRequest(format!("'{field}': {message}"))
}

fn as_str<'a>(field: &str, value: &'a Value) -> Result<&'a str, RuntimeError> {
    value.as_str().ok_or_else(|| invalid(field, "expected a string"))
}

fn as_bool(field: &str, value: &Value) -> Result<bool, RuntimeError> {
    value.as_bool().ok_or_else(|| invalid(field, "expected a boolean"))
}

fn as_i32(field: &str, value: &Value) -> Result<i32, RuntimeError> {
    value
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| invalid(field, "expected a 32-bit integer"))
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Result<&'a str, RuntimeError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(pointer, "expected a string"))
}

fn list<'a>(field: &str, value: &'a Value) -> Result<&'a Vec<Value>, RuntimeError> {
    value.as_array().ok_or_else(|| invalid(field, "expected a list"))
}

fn action_groups(value: &Value) -> Result<Vec<wire::AgentActionGroup>, RuntimeError> {
    list("actionGroups", value)?.iter().map(action_group).collect()
}

fn action_group(value: &Value) -> Result<wire::AgentActionGroup, RuntimeError> {
    let mut group =
        wire::AgentActionGroup::builder().action_group_name(str_at(value, "/actionGroupName")?);
    if let Some(description) = value["description"].as_str() {
        group = group.description(description);
    }
    if let Some(signature) = value["parentActionGroupSignature"].as_str() {
        group = group.parent_action_group_signature(wire::ActionGroupSignature::from(signature));
    }
    if let Some(control) = value
        .pointer("/actionGroupExecutor/customControl")
        .and_then(Value::as_str)
    {
        group = group.action_group_executor(wire::ActionGroupExecutor::CustomControl(
            wire::CustomControlMethod::from(control),
        ));
    }
    if let Some(functions) = value.pointer("/functionSchema/functions") {
        let functions = list("functions", functions)?
            .iter()
            .map(function_definition)
            .collect::<Result<Vec<_>, _>>()?;
        group = group.function_schema(wire::FunctionSchema::Functions(functions));
    }
    group.build().map_err(|e| invalid("actionGroups", e))
}

fn function_definition(value: &Value) -> Result<wire::FunctionDefinition, RuntimeError> {
    let mut function = wire::FunctionDefinition::builder().name(str_at(value, "/name")?);
    if let Some(description) = value["description"].as_str() {
        function = function.description(description);
    }
    if let Some(confirmation) = value["requireConfirmation"].as_str() {
        function = function.require_confirmation(wire::RequireConfirmation::from(confirmation));
    }
    if let Some(parameters) = value["parameters"].as_object() {
        for (name, param) in parameters {
            let mut detail = wire::ParameterDetail::builder()
                .r#type(wire::ParameterType::from(str_at(param, "/type")?))
                .required(param["required"].as_bool().unwrap_or(false));
            if let Some(description) = param["description"].as_str() {
                detail = detail.description(description);
            }
            let detail = detail.build().map_err(|e| invalid(name, e))?;
            function = function.parameters(name.clone(), detail);
        }
    }
    function.build().map_err(|e| invalid("functions", e))
}

fn session_state(value: &Value) -> Result<wire::InlineSessionState, RuntimeError> {
    let mut state = wire::InlineSessionState::builder();
    if let Some(id) = value["invocationId"].as_str() {
        state = state.invocation_id(id);
    }
    if let Some(results) = value.get("returnControlInvocationResults") {
        for result in list("returnControlInvocationResults", results)? {
            state = state.return_control_invocation_results(
                wire::InvocationResultMember::FunctionResult(function_result(result)?),
            );
        }
    }
    if let Some(files) = value.get("files") {
        for file in list("files", files)? {
            state = state.files(input_file(file)?);
        }
    }
    Ok(state.build())
}

fn function_result(value: &Value) -> Result<wire::FunctionResult, RuntimeError> {
    let mut result = wire::FunctionResult::builder()
        .action_group(str_at(value, "/functionResult/actionGroup")?);
    if let Some(function) = value.pointer("/functionResult/function").and_then(Value::as_str) {
        result = result.function(function);
    }
    // "~1" escapes the slash in the "application/json" key.
    if let Some(body) = value
        .pointer("/functionResult/responseBody/application~1json/body")
        .and_then(Value::as_str)
    {
        result = result.response_body(
            "application/json",
            wire::ContentBody::builder().body(body).build(),
        );
    }
    result.build().map_err(|e| invalid("functionResult", e))
}

fn input_file(value: &Value) -> Result<wire::InputFile, RuntimeError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(str_at(value, "/source/byteContent/data")?)
        .map_err(|e| invalid("files", e))?;
    let content = wire::ByteContentFile::builder()
        .media_type(str_at(value, "/source/byteContent/mediaType")?)
        .data(Blob::new(data))
        .build()
        .map_err(|e| invalid("files", e))?;
    let source_type = value
        .pointer("/source/sourceType")
        .and_then(Value::as_str)
        .unwrap_or("BYTE_CONTENT");
    let source = wire::FileSource::builder()
        .source_type(wire::FileSourceType::from(source_type))
        .byte_content(content)
        .build()
        .map_err(|e| invalid("files", e))?;
    wire::InputFile::builder()
        .name(str_at(value, "/name")?)
        .source(source)
        .use_case(wire::FileUseCase::from(
            value["useCase"].as_str().unwrap_or(DEFAULT_USE_CASE),
        ))
        .build()
        .map_err(|e| invalid("files", e))
}

fn guardrail(value: &Value) -> Result<wire::GuardrailConfigurationWithArn, RuntimeError> {
    wire::GuardrailConfigurationWithArn::builder()
        .guardrail_identifier(str_at(value, "/guardrailIdentifier")?)
        .guardrail_version(
            value["guardrailVersion"]
                .as_str()
                .unwrap_or(DEFAULT_GUARDRAIL_VERSION),
        )
        .build()
        .map_err(|e| invalid("guardrailConfiguration", e))
}

fn knowledge_bases(value: &Value) -> Result<Vec<wire::KnowledgeBase>, RuntimeError> {
    list("knowledgeBases", value)?
        .iter()
        .map(|kb| {
            let id = str_at(kb, "/knowledgeBaseId")?;
            if kb.get("retrievalConfiguration").is_some() {
                warn!(knowledge_base = id, "retrievalConfiguration not forwarded by the SDK runtime");
            }
            let description = kb["description"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("Knowledge base {id}"));
            wire::KnowledgeBase::builder()
                .knowledge_base_id(id)
                .description(description)
                .build()
                .map_err(|e| invalid("knowledgeBases", e))
        })
        .collect()
}

// --- Response translation ---

fn convert_event(event: wire::InlineAgentResponseStream) -> Option<ResponseEvent> {
    match event {
        wire::InlineAgentResponseStream::Chunk(part) => part
            .bytes()
            .map(|b| ResponseEvent::Chunk(String::from_utf8_lossy(b.as_ref()).into_owned())),
        wire::InlineAgentResponseStream::ReturnControl(payload) => {
            Some(ResponseEvent::ReturnControl(return_control(&payload)))
        }
        wire::InlineAgentResponseStream::Files(part) => Some(ResponseEvent::Files(
            part.files().iter().map(output_file).collect(),
        )),
        wire::InlineAgentResponseStream::Trace(part) => {
            Some(ResponseEvent::Trace(json!({ "trace": format!("{part:?}") })))
        }
        other => {
            debug!(event = ?other, "skipping unrecognised stream event");
            None
        }
    }
}

fn return_control(payload: &wire::InlineAgentReturnControlPayload) -> ReturnControl {
    ReturnControl {
        invocation_id: payload.invocation_id().unwrap_or_default().to_string(),
        invocation_inputs: payload
            .invocation_inputs()
            .iter()
            .map(|input| InvocationInput {
                function_invocation_input: match input {
                    wire::InvocationInputMember::FunctionInvocationInput(f) => {
                        Some(FunctionInvocation {
                            action_group: f.action_group().to_string(),
                            function: f.function().unwrap_or_default().to_string(),
                            parameters: f
                                .parameters()
                                .iter()
                                .map(|p| {
                                    FunctionParameter::new(
                                        p.name().unwrap_or_default(),
                                        p.value().unwrap_or_default(),
                                        p.r#type().unwrap_or("string"),
                                    )
                                })
                                .collect(),
                        })
                    }
                    _ => None,
                },
            })
            .collect(),
    }
}

fn output_file(file: &wire::OutputFile) -> OutputFile {
    OutputFile::new(
        file.name().unwrap_or_default(),
        file.bytes().map(|b| b.as_ref().to_vec()).unwrap_or_default(),
        file.r#type().unwrap_or_default(),
    )
}
