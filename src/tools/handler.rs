use async_trait::async_trait;
use serde_json::{Map, Value};

/// Why a tool call failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    /// Arguments were missing or of the wrong shape.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Failed(String),
}

/// A tool's execution handler. Consumers implement this for each tool.
///
/// `args` holds the converted native arguments keyed by parameter name.
/// The return value is serialized to JSON and sent back to the remote model.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &Args) -> Result<Value, ToolError>;
}

/// Adapts a plain synchronous closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(&Args) -> Result<Value, ToolError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(&Args) -> Result<Value, ToolError> + Send + Sync,
{
    async fn call(&self, args: &Args) -> Result<Value, ToolError> {
        (self.0)(args)
    }
}

/// Native keyword arguments for a tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.required(name)?
            .as_str()
            .ok_or_else(|| type_error(name, "a string"))
    }

    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        self.required(name)?
            .as_f64()
            .ok_or_else(|| type_error(name, "a number"))
    }

    pub fn i64(&self, name: &str) -> Result<i64, ToolError> {
        self.required(name)?
            .as_i64()
            .ok_or_else(|| type_error(name, "an integer"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        self.required(name)?
            .as_bool()
            .ok_or_else(|| type_error(name, "a boolean"))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, ToolError> {
        self.optional(name, Value::as_str, "a string")
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, ToolError> {
        self.optional(name, Value::as_f64, "a number")
    }

    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>, ToolError> {
        self.optional(name, Value::as_i64, "an integer")
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, ToolError> {
        self.optional(name, Value::as_bool, "a boolean")
    }

    fn required(&self, name: &str) -> Result<&Value, ToolError> {
        self.0
            .get(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing required argument '{name}'")))
    }

    fn optional<'a, T>(
        &'a self,
        name: &str,
        extract: impl Fn(&'a Value) -> Option<T>,
        expected: &str,
    ) -> Result<Option<T>, ToolError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => extract(v).map(Some).ok_or_else(|| type_error(name, expected)),
        }
    }
}

impl From<Map<String, Value>> for Args {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn type_error(name: &str, expected: &str) -> ToolError {
    ToolError::InvalidArguments(format!("argument '{name}' must be {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> Args {
        match v {
            Value::Object(map) => Args::new(map),
            _ => Args::default(),
        }
    }

    #[test]
    fn typed_accessors() {
        let a = args(json!({"city": "Oslo", "days": 3, "ratio": 0.5, "metric": true}));
        assert_eq!(a.str("city").unwrap(), "Oslo");
        assert_eq!(a.i64("days").unwrap(), 3);
        assert_eq!(a.f64("ratio").unwrap(), 0.5);
        assert!(a.bool("metric").unwrap());
        assert_eq!(a.opt_str("missing").unwrap(), None);
    }

    #[test]
    fn shape_errors_are_invalid_arguments() {
        let a = args(json!({"metric": "maybe"}));
        assert!(matches!(a.bool("metric"), Err(ToolError::InvalidArguments(_))));
        assert!(matches!(a.str("city"), Err(ToolError::InvalidArguments(_))));
        assert!(matches!(a.opt_bool("metric"), Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn closure_handler() {
        let handler = FnHandler::new(|a| Ok(json!({"sum": a.i64("a")? + a.i64("b")?})));
        let out = handler.call(&args(json!({"a": 2, "b": 3}))).await.unwrap();
        assert_eq!(out, json!({"sum": 5}));
    }
}
