use serde_json::Value;

use crate::RunOutcome;

/// Events emitted while a request runs, for UI streaming.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    TurnStart { turn: usize },
    Text { content: String },
    ToolCall { group: String, name: String, args: Value },
    ToolResult {
        name: String,
        output: Option<String>,
        error: Option<String>,
    },
    Files { count: usize },
    Trace { lines: Vec<String> },
    Finished { turns: usize, outcome: RunOutcome },
    Error { message: String },
}
