#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("agent cancelled")]
    Cancelled,
    #[error("session error: {0}")]
    Session(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single call to the remote agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("API returned {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    /// The request cannot be expressed in the runtime's wire format.
    #[error("invalid request field {0}")]
    InvalidRequest(String),
}

/// Raised by a plugin hook. Ends the current turn like a runtime failure.
#[derive(Debug, thiserror::Error)]
#[error("plugin '{plugin}' failed: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Anything that ends a turn before its events can be scanned.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TurnError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
}
