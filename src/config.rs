use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    pub instruction: String,
    /// Maximum remote calls per user message.
    pub max_turns: usize,
    pub enable_code_interpreter: bool,
    pub trace_level: TraceLevel,
    /// Session to continue. A fresh id is generated per run when unset.
    pub session_id: Option<String>,
    /// Extra request fields merged into every outbound call, before plugins.
    pub advanced_config: Map<String, Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".into(),
            model: "anthropic.claude-3-5-sonnet-20240620-v1:0".into(),
            instruction: "You are a helpful assistant.".into(),
            max_turns: 10,
            enable_code_interpreter: false,
            trace_level: TraceLevel::None,
            session_id: None,
            advanced_config: Map::new(),
        }
    }
}

impl AgentConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| AgentError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_turns == 0 {
            return Err(AgentError::Config("max_turns must be at least 1".into()));
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::Config("model must not be empty".into()));
        }
        Ok(())
    }
}

/// How chatty the client is. Only affects diagnostics, never the protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// `EnvFilter` directive for a subscriber installed by the binary.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn,inline_agent=info",
            Verbosity::Verbose => "info,inline_agent=debug",
            Verbosity::Debug => "debug,inline_agent=trace",
        }
    }
}

impl FromStr for Verbosity {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" => Ok(Verbosity::Quiet),
            "normal" => Ok(Verbosity::Normal),
            "verbose" => Ok(Verbosity::Verbose),
            "debug" => Ok(Verbosity::Debug),
            other => Err(AgentError::Config(format!("unknown verbosity '{other}'"))),
        }
    }
}

/// How much of the remote side's diagnostic trace to surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    #[default]
    None,
    Minimal,
    Standard,
    Detailed,
    Raw,
}

impl TraceLevel {
    /// Whether traces are requested from the remote endpoint at all.
    pub fn enabled(self) -> bool {
        self != TraceLevel::None
    }
}

impl FromStr for TraceLevel {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(TraceLevel::None),
            "minimal" => Ok(TraceLevel::Minimal),
            "standard" => Ok(TraceLevel::Standard),
            "detailed" => Ok(TraceLevel::Detailed),
            "raw" => Ok(TraceLevel::Raw),
            other => Err(AgentError::Config(format!("unknown trace level '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AgentConfig::default();
        assert_eq!(c.max_turns, 10);
        assert!(!c.trace_level.enabled());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn loads_partial_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(
            &path,
            r#"{"model": "m-1", "max_turns": 3, "trace_level": "standard",
                "advanced_config": {"idleSessionTTLInSeconds": 600}}"#,
        )
        .unwrap();

        let c = AgentConfig::from_json_file(&path).unwrap();
        assert_eq!(c.model, "m-1");
        assert_eq!(c.max_turns, 3);
        assert_eq!(c.trace_level, TraceLevel::Standard);
        assert_eq!(c.advanced_config["idleSessionTTLInSeconds"], 600);
        assert_eq!(c.name, "agent");
    }

    #[test]
    fn rejects_zero_turns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, r#"{"max_turns": 0}"#).unwrap();
        assert!(matches!(
            AgentConfig::from_json_file(&path),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn parse_levels() {
        assert_eq!("VERBOSE".parse::<Verbosity>().unwrap(), Verbosity::Verbose);
        assert_eq!("raw".parse::<TraceLevel>().unwrap(), TraceLevel::Raw);
        assert!("loud".parse::<Verbosity>().is_err());
    }
}
