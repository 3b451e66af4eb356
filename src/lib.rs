#[cfg(feature = "bedrock")]
pub mod bedrock;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod files;
pub mod plugin;
pub mod runtime;
pub mod session;
pub mod tools;
pub mod trace;
pub mod types;

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use config::{AgentConfig, TraceLevel, Verbosity};
pub use error::{AgentError, PluginError, RuntimeError};
pub use events::AgentEvent;
pub use files::{InputFile, OutputFile};
pub use plugin::{
    guardrail::GuardrailPlugin, knowledge_base::KnowledgeBasePlugin, security::SecurityPlugin,
    AgentPlugin, PluginChain,
};
#[cfg(feature = "bedrock")]
pub use bedrock::BedrockAgentRuntime;
pub use runtime::{AgentRuntime, HttpAgentRuntime};
pub use session::{FileSessionStore, NoSessionStore, Session, SessionStore};
pub use tools::{
    build_action_groups, ActionGroup, Args, ExecutionError, FnHandler, ParamSpec, ParamType,
    ToolDef, ToolError, ToolHandler, ToolRegistry, DEFAULT_GROUP,
};
pub use types::{
    FunctionParameter, FunctionResult, InvokeRequest, InvokeResponse, Message, ResponseEvent,
    ReturnControl, Role, TurnInput,
};

use error::TurnError;

/// Appended to the response when a run hits `max_turns`.
pub const MAX_TURNS_NOTICE: &str =
    "\n\nReached maximum number of tool calls. Some tasks may be incomplete.";

const ERROR_PREFIX: &str = "An error occurred: ";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The remote side answered without asking for another tool.
    Completed,
    /// A requested tool was unknown, rejected its arguments, failed or returned nothing.
    ToolAborted,
    /// `max_turns` remote calls were made and another was needed.
    TurnLimit,
    /// A remote call or plugin hook failed. The response holds the error text.
    Failed,
}

/// Result of one user message.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Text of every turn, newline-joined.
    pub response: String,
    /// Files generated across all turns, in arrival order.
    pub files: Vec<OutputFile>,
    /// Remote calls made.
    pub turns: usize,
    pub session_id: String,
    pub outcome: RunOutcome,
}

impl AgentResult {
    /// Write every generated file into `dir`, creating it if needed.
    pub async fn save_all_files(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, AgentError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let mut saved = Vec::with_capacity(self.files.len());
        for file in &self.files {
            saved.push(file.save(dir).await?);
        }
        Ok(saved)
    }
}

/// Input to [`Agent::run`]: exactly one of a single message or a message list.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub message: Option<String>,
    pub messages: Option<Vec<Message>>,
    /// Session to continue. Falls back to the configured one, then a fresh id.
    pub session_id: Option<String>,
}

impl RunRequest {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Check the request shape and return the text to send.
    pub fn validate(&self) -> Result<&str, AgentError> {
        match (&self.message, &self.messages) {
            (Some(_), Some(_)) => Err(AgentError::Validation(
                "provide either a message or a list of messages, not both".into(),
            )),
            (None, None) => Err(AgentError::Validation(
                "either a message or a list of messages is required".into(),
            )),
            (Some(text), None) => Ok(text),
            (None, Some(messages)) => match messages.last() {
                None => Err(AgentError::Validation("message list is empty".into())),
                Some(last) if last.role != Role::User => Err(AgentError::Validation(
                    "the last message must be from the user".into(),
                )),
                Some(last) => Ok(&last.content),
            },
        }
    }
}

/// The agent. Wire up a runtime, tools, and go.
pub struct Agent {
    runtime: Box<dyn AgentRuntime>,
    tools: ToolRegistry,
    plugins: PluginChain,
    config: AgentConfig,
    files: Vec<InputFile>,
}

impl Agent {
    pub fn new(
        runtime: impl AgentRuntime + 'static,
        tools: ToolRegistry,
        config: AgentConfig,
    ) -> Self {
        Self {
            runtime: Box::new(runtime),
            tools,
            plugins: PluginChain::new(),
            config,
            files: Vec::new(),
        }
    }

    pub fn with_plugin(mut self, plugin: impl AgentPlugin + 'static) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn add_plugin(&mut self, plugin: impl AgentPlugin + 'static) {
        self.plugins.push(plugin);
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn plugins(&self) -> &PluginChain {
        &self.plugins
    }

    /// Attach a file to every subsequent remote call.
    pub fn add_file(&mut self, file: InputFile) {
        debug!(file = %file.name, media_type = %file.media_type, "attaching file");
        self.files.push(file);
    }

    pub async fn add_file_from_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<&InputFile, AgentError> {
        let file = InputFile::from_path(path).await?;
        self.add_file(file);
        let last = self.files.len() - 1;
        Ok(&self.files[last])
    }

    pub fn clear_files(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    /// Simple invocation with a single user message.
    pub async fn invoke(&self, message: &str) -> Result<AgentResult, AgentError> {
        self.run(RunRequest::message(message)).await
    }

    /// Invocation with cancellation support. Checked between turns.
    pub async fn invoke_with_cancel(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<AgentResult, AgentError> {
        self.run_with(request, Some(cancel), None).await
    }

    /// Invocation with streaming events.
    pub async fn invoke_streaming(
        &self,
        request: RunRequest,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<AgentResult, AgentError> {
        self.run_with(request, None, Some(tx)).await
    }

    /// Run one user message to completion.
    ///
    /// Only validation errors are returned as `Err`. Transport, plugin and
    /// tool failures degrade into the returned [`AgentResult`].
    pub async fn run(&self, request: RunRequest) -> Result<AgentResult, AgentError> {
        self.run_with(request, None, None).await
    }

    async fn run_with(
        &self,
        request: RunRequest,
        cancel: Option<CancellationToken>,
        tx: Option<mpsc::Sender<AgentEvent>>,
    ) -> Result<AgentResult, AgentError> {
        let text = request.validate()?.to_string();
        let session_id = request
            .session_id
            .or_else(|| self.config.session_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        self.run_loop(session_id, text, cancel, tx).await
    }

    async fn run_loop(
        &self,
        session_id: String,
        text: String,
        cancel: Option<CancellationToken>,
        tx: Option<mpsc::Sender<AgentEvent>>,
    ) -> Result<AgentResult, AgentError> {
        let base = self.base_request(&session_id)?;
        let mut input = TurnInput::UserText(text);
        let mut accumulated = String::new();
        let mut files: Vec<OutputFile> = Vec::new();
        let mut turn = 0;

        loop {
            if let Some(ref cancel) = cancel {
                if cancel.is_cancelled() {
                    info!(turn, %session_id, "agent cancelled");
                    return Err(AgentError::Cancelled);
                }
            }

            turn += 1;
            if turn > self.config.max_turns {
                warn!(max_turns = self.config.max_turns, "agent hit max turns limit");
                accumulated.push_str(MAX_TURNS_NOTICE);
                let result = AgentResult {
                    response: accumulated,
                    files,
                    turns: self.config.max_turns,
                    session_id,
                    outcome: RunOutcome::TurnLimit,
                };
                return Ok(self.finish(result, &tx).await);
            }

            emit(&tx, AgentEvent::TurnStart { turn }).await;
            info!(turn, %session_id, "agent turn");

            let request = self.build_request(&base, &input);
            let response = match self.call_remote(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(turn, error = %e, "turn failed");
                    emit(&tx, AgentEvent::Error { message: e.to_string() }).await;
                    let result = AgentResult {
                        response: format!("{ERROR_PREFIX}{e}"),
                        files,
                        turns: turn,
                        session_id,
                        outcome: RunOutcome::Failed,
                    };
                    emit(&tx, finished(&result)).await;
                    return Ok(result);
                }
            };

            let mut turn_text = String::new();
            let mut return_control = None;
            for event in response.events {
                match event {
                    ResponseEvent::Chunk(chunk) => turn_text.push_str(&chunk),
                    ResponseEvent::Files(batch) => {
                        for file in &batch {
                            debug!(file = %file.name, bytes = file.content.len(), "received file");
                        }
                        emit(&tx, AgentEvent::Files { count: batch.len() }).await;
                        files.extend(batch);
                    }
                    ResponseEvent::Trace(payload) => {
                        let lines = trace::log_trace(&payload, self.config.trace_level);
                        if !lines.is_empty() {
                            emit(&tx, AgentEvent::Trace { lines }).await;
                        }
                    }
                    ResponseEvent::ReturnControl(rc) => {
                        return_control = Some(rc);
                        break;
                    }
                }
            }

            if !turn_text.is_empty() {
                emit(&tx, AgentEvent::Text { content: turn_text.clone() }).await;
                if !accumulated.is_empty() {
                    accumulated.push('\n');
                }
                accumulated.push_str(&turn_text);
            }

            let call = return_control.and_then(|rc| {
                let call = rc.function()?.clone();
                Some((rc.invocation_id, call))
            });
            let Some((invocation_id, call)) = call else {
                info!(turns = turn, "agent finished");
                let result = AgentResult {
                    response: accumulated,
                    files,
                    turns: turn,
                    session_id,
                    outcome: RunOutcome::Completed,
                };
                return Ok(self.finish(result, &tx).await);
            };

            let args = tools::convert_parameters(&call.parameters);
            debug!(turn, group = %call.action_group, tool = %call.function, "tool call requested");
            emit(
                &tx,
                AgentEvent::ToolCall {
                    group: call.action_group.clone(),
                    name: call.function.clone(),
                    args: Value::Object(args.as_map().clone()),
                },
            )
            .await;

            match self.tools.execute(&call.function, &args).await {
                Ok(value) => {
                    let body = value.to_string();
                    emit(
                        &tx,
                        AgentEvent::ToolResult {
                            name: call.function.clone(),
                            output: Some(body.clone()),
                            error: None,
                        },
                    )
                    .await;
                    input = TurnInput::ToolResult {
                        invocation_id,
                        result: FunctionResult {
                            action_group: call.action_group,
                            function: call.function,
                            body,
                        },
                    };
                }
                Err(e) => {
                    warn!(turn, error = %e, "no tool result, ending run");
                    emit(
                        &tx,
                        AgentEvent::ToolResult {
                            name: call.function,
                            output: None,
                            error: Some(e.to_string()),
                        },
                    )
                    .await;
                    let result = AgentResult {
                        response: accumulated,
                        files,
                        turns: turn,
                        session_id,
                        outcome: RunOutcome::ToolAborted,
                    };
                    return Ok(self.finish(result, &tx).await);
                }
            }
        }
    }

    /// Fields shared by every turn of a run.
    fn base_request(&self, session_id: &str) -> Result<InvokeRequest, AgentError> {
        let groups = build_action_groups(&self.tools, self.config.enable_code_interpreter);
        let groups = serde_json::to_value(groups)
            .map_err(|e| AgentError::Config(format!("action group schema: {e}")))?;

        let mut request = InvokeRequest::new();
        request.insert("sessionId", Value::String(session_id.to_string()));
        request.insert("actionGroups", groups);
        request.insert("instruction", Value::String(self.config.instruction.clone()));
        request.insert("foundationModel", Value::String(self.config.model.clone()));
        request.insert("enableTrace", Value::Bool(self.config.trace_level.enabled()));
        for (key, value) in &self.config.advanced_config {
            request.insert(key.clone(), value.clone());
        }
        Ok(request)
    }

    fn build_request(&self, base: &InvokeRequest, input: &TurnInput) -> InvokeRequest {
        let mut request = base.clone();
        let files: Vec<Value> = self.files.iter().map(InputFile::to_wire).collect();

        match input {
            TurnInput::UserText(text) => {
                request.insert("inputText", Value::String(text.clone()));
                if !files.is_empty() {
                    request.insert("inlineSessionState", json!({ "files": files }));
                }
            }
            TurnInput::ToolResult {
                invocation_id,
                result,
            } => {
                let mut state = Map::new();
                state.insert("invocationId".into(), Value::String(invocation_id.clone()));
                state.insert(
                    "returnControlInvocationResults".into(),
                    Value::Array(vec![result.to_wire()]),
                );
                if !files.is_empty() {
                    state.insert("files".into(), Value::Array(files));
                }
                request.insert("inlineSessionState", Value::Object(state));
            }
        }
        request
    }

    /// pre_invoke, one remote call, post_invoke.
    async fn call_remote(&self, request: InvokeRequest) -> Result<InvokeResponse, TurnError> {
        let request = self.plugins.pre_invoke(request)?;
        let response = self.runtime.invoke(request).await?;
        Ok(self.plugins.post_invoke(response)?)
    }

    /// Run post_process hooks over a final result. A hook failure degrades the run.
    async fn finish(
        &self,
        result: AgentResult,
        tx: &Option<mpsc::Sender<AgentEvent>>,
    ) -> AgentResult {
        let turns = result.turns;
        let session_id = result.session_id.clone();
        let result = match self.plugins.post_process(result) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "post-process hook failed");
                emit(tx, AgentEvent::Error { message: e.to_string() }).await;
                AgentResult {
                    response: format!("{ERROR_PREFIX}{e}"),
                    files: Vec::new(),
                    turns,
                    session_id,
                    outcome: RunOutcome::Failed,
                }
            }
        };
        emit(tx, finished(&result)).await;
        result
    }
}

fn finished(result: &AgentResult) -> AgentEvent {
    AgentEvent::Finished {
        turns: result.turns,
        outcome: result.outcome,
    }
}

async fn emit(tx: &Option<mpsc::Sender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::RuntimeError;
    use crate::runtime::AgentRuntime;
    use crate::types::{
        FunctionInvocation, FunctionParameter, InvocationInput, InvokeRequest, InvokeResponse,
        ResponseEvent, ReturnControl,
    };

    /// Replays canned responses and records every request it sees.
    pub struct MockRuntime {
        responses: tokio::sync::Mutex<VecDeque<Result<InvokeResponse, RuntimeError>>>,
        pub requests: Arc<Mutex<Vec<InvokeRequest>>>,
    }

    impl MockRuntime {
        pub fn new(responses: Vec<InvokeResponse>) -> Self {
            Self::with_results(responses.into_iter().map(Ok).collect())
        }

        pub fn with_results(responses: Vec<Result<InvokeResponse, RuntimeError>>) -> Self {
            Self {
                responses: tokio::sync::Mutex::new(responses.into()),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl AgentRuntime for MockRuntime {
        async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RuntimeError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(RuntimeError::Request("no more mock responses".into())))
        }
    }

    pub fn text(t: &str) -> InvokeResponse {
        InvokeResponse::new(vec![ResponseEvent::Chunk(t.into())])
    }

    pub fn tool_call(
        invocation_id: &str,
        group: &str,
        function: &str,
        params: Vec<FunctionParameter>,
    ) -> ResponseEvent {
        ResponseEvent::ReturnControl(ReturnControl {
            invocation_id: invocation_id.into(),
            invocation_inputs: vec![InvocationInput {
                function_invocation_input: Some(FunctionInvocation {
                    action_group: group.into(),
                    function: function.into(),
                    parameters: params,
                }),
            }],
        })
    }
}
