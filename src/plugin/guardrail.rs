use serde_json::{json, Value};

use super::AgentPlugin;
use crate::error::PluginError;
use crate::types::InvokeRequest;

/// Attaches a guardrail to every request that doesn't already carry one.
pub struct GuardrailPlugin {
    guardrail_id: String,
    guardrail_version: Option<String>,
}

impl GuardrailPlugin {
    pub fn new(guardrail_id: impl Into<String>) -> Self {
        Self {
            guardrail_id: guardrail_id.into(),
            guardrail_version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.guardrail_version = Some(version.into());
        self
    }
}

impl AgentPlugin for GuardrailPlugin {
    fn name(&self) -> &str {
        "guardrail"
    }

    fn pre_invoke(&self, mut request: InvokeRequest) -> Result<InvokeRequest, PluginError> {
        if !request.contains_key("guardrailConfiguration") {
            let mut config = json!({ "guardrailIdentifier": self.guardrail_id });
            if let Some(ref version) = self.guardrail_version {
                config["guardrailVersion"] = Value::String(version.clone());
            }
            request.insert("guardrailConfiguration", config);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_configuration() {
        let req = GuardrailPlugin::new("gr-1")
            .with_version("2")
            .pre_invoke(InvokeRequest::new())
            .unwrap();
        assert_eq!(
            req.get("guardrailConfiguration"),
            Some(&json!({"guardrailIdentifier": "gr-1", "guardrailVersion": "2"}))
        );
    }

    #[test]
    fn keeps_existing_configuration() {
        let mut req = InvokeRequest::new();
        req.insert("guardrailConfiguration", json!({"guardrailIdentifier": "mine"}));
        let req = GuardrailPlugin::new("gr-1").pre_invoke(req).unwrap();
        assert_eq!(req.get("guardrailConfiguration").unwrap()["guardrailIdentifier"], "mine");
    }
}
