use serde_json::Value;
use tracing::{debug, warn};

use super::handler::{Args, ToolError};
use super::registry::{Tool, ToolRegistry};

/// Why a requested tool produced no usable result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("tool '{0}' is not registered")]
    UnknownTool(String),
    #[error("bad arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("tool '{tool}' failed: {message}")]
    Failed { tool: String, message: String },
    #[error("tool '{0}' returned no result")]
    NoResult(String),
}

impl ToolRegistry {
    /// Look up and run a tool. Failures are logged and returned, never raised.
    pub async fn execute(&self, name: &str, args: &Args) -> Result<Value, ExecutionError> {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "requested tool is not registered");
            return Err(ExecutionError::UnknownTool(name.to_string()));
        };

        if let Err(message) = check_arguments(tool, args) {
            warn!(tool = name, args = ?args.as_map(), error = %message, "arguments do not match the declared parameters");
            return Err(ExecutionError::InvalidArguments {
                tool: name.to_string(),
                message,
            });
        }

        match tool.handler.call(args).await {
            Ok(Value::Null) => {
                warn!(tool = name, "tool returned no result");
                Err(ExecutionError::NoResult(name.to_string()))
            }
            Ok(value) => {
                debug!(tool = name, result = %value, "tool executed");
                Ok(value)
            }
            Err(ToolError::InvalidArguments(message)) => {
                warn!(tool = name, args = ?args.as_map(), error = %message, "tool rejected its arguments");
                Err(ExecutionError::InvalidArguments {
                    tool: name.to_string(),
                    message,
                })
            }
            Err(ToolError::Failed(message)) => {
                warn!(tool = name, error = %message, "tool failed");
                Err(ExecutionError::Failed {
                    tool: name.to_string(),
                    message,
                })
            }
        }
    }
}

/// Every argument must be declared and every required parameter present.
fn check_arguments(tool: &Tool, args: &Args) -> Result<(), String> {
    if let Some(unexpected) = args
        .as_map()
        .keys()
        .find(|k| !tool.parameters.iter().any(|p| &p.name == *k))
    {
        return Err(format!("unexpected argument '{unexpected}'"));
    }
    if let Some(missing) = tool
        .parameters
        .iter()
        .find(|p| p.required && args.get(&p.name).is_none())
    {
        return Err(format!("missing required argument '{}'", missing.name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::handler::FnHandler;
    use crate::tools::registry::{ParamSpec, ToolDef};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .add(ToolDef::new("status", FnHandler::new(|_| Ok(json!({"status": "success"})))))
            .add(
                ToolDef::new("double", FnHandler::new(|a| Ok(json!(a.i64("n")? * 2))))
                    .param(ParamSpec::number("n")),
            )
            .add(ToolDef::new(
                "broken",
                FnHandler::new(|_| Err(ToolError::Failed("disk on fire".into()))),
            ))
            .add(ToolDef::new("silent", FnHandler::new(|_| Ok(Value::Null))))
    }

    fn args(v: Value) -> Args {
        Args::new(v.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn runs_registered_tool() {
        let out = registry().execute("status", &Args::default()).await.unwrap();
        assert_eq!(out, json!({"status": "success"}));

        let out = registry().execute("double", &args(json!({"n": 21}))).await.unwrap();
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn unknown_tool() {
        let err = registry().execute("nope", &Args::default()).await.unwrap_err();
        assert_eq!(err, ExecutionError::UnknownTool("nope".into()));
    }

    #[tokio::test]
    async fn missing_argument() {
        let err = registry().execute("double", &Args::default()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn undeclared_argument_is_rejected() {
        let err = registry()
            .execute("status", &args(json!({"bogus": 1})))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::InvalidArguments {
                tool: "status".into(),
                message: "unexpected argument 'bogus'".into(),
            }
        );
    }

    #[tokio::test]
    async fn required_argument_checked_before_handler() {
        // The handler would happily fall back to a default.
        let reg = ToolRegistry::new().add(
            ToolDef::new(
                "greet",
                FnHandler::new(|a| Ok(json!(a.opt_str("name")?.unwrap_or("anon")))),
            )
            .param(ParamSpec::string("name"))
            .param(ParamSpec::boolean("shout").optional()),
        );

        let err = reg.execute("greet", &Args::default()).await.unwrap_err();
        assert_eq!(
            err,
            ExecutionError::InvalidArguments {
                tool: "greet".into(),
                message: "missing required argument 'name'".into(),
            }
        );

        let out = reg.execute("greet", &args(json!({"name": "Ada"}))).await.unwrap();
        assert_eq!(out, json!("Ada"));
    }

    #[tokio::test]
    async fn runtime_failure() {
        let err = registry().execute("broken", &Args::default()).await.unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
    }

    #[tokio::test]
    async fn null_is_no_result() {
        let err = registry().execute("silent", &Args::default()).await.unwrap_err();
        assert_eq!(err, ExecutionError::NoResult("silent".into()));
    }
}
