pub mod guardrail;
pub mod knowledge_base;
pub mod security;

use crate::error::PluginError;
use crate::types::{InvokeRequest, InvokeResponse};
use crate::AgentResult;

/// Hooks around every remote call. Each hook defaults to identity.
///
/// Hooks are synchronous, pure transforms. They run in registration order and
/// see the mutations of earlier plugins. An error from any hook ends the turn.
pub trait AgentPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Rewrite the outbound request.
    fn pre_invoke(&self, request: InvokeRequest) -> Result<InvokeRequest, PluginError> {
        Ok(request)
    }

    /// Rewrite the raw response before it is scanned.
    fn post_invoke(&self, response: InvokeResponse) -> Result<InvokeResponse, PluginError> {
        Ok(response)
    }

    /// Rewrite the final assembled result.
    fn post_process(&self, result: AgentResult) -> Result<AgentResult, PluginError> {
        Ok(result)
    }
}

/// Ordered plugin list owned by whatever issues the remote calls.
#[derive(Default)]
pub struct PluginChain {
    plugins: Vec<Box<dyn AgentPlugin>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, plugin: impl AgentPlugin + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    pub fn pre_invoke(&self, request: InvokeRequest) -> Result<InvokeRequest, PluginError> {
        self.plugins.iter().try_fold(request, |req, p| p.pre_invoke(req))
    }

    pub fn post_invoke(&self, response: InvokeResponse) -> Result<InvokeResponse, PluginError> {
        self.plugins
            .iter()
            .try_fold(response, |resp, p| p.post_invoke(resp))
    }

    pub fn post_process(&self, result: AgentResult) -> Result<AgentResult, PluginError> {
        self.plugins
            .iter()
            .try_fold(result, |res, p| p.post_process(res))
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Tag(&'static str);

    impl AgentPlugin for Tag {
        fn name(&self) -> &str {
            self.0
        }

        fn pre_invoke(&self, mut request: InvokeRequest) -> Result<InvokeRequest, PluginError> {
            let trail = match request.get("trail").and_then(|v| v.as_str()) {
                Some(prev) => format!("{prev},{}", self.0),
                None => self.0.to_string(),
            };
            request.insert("trail", json!(trail));
            Ok(request)
        }
    }

    struct Failing;

    impl AgentPlugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn pre_invoke(&self, _request: InvokeRequest) -> Result<InvokeRequest, PluginError> {
            Err(PluginError::new("failing", "nope"))
        }
    }

    #[test]
    fn hooks_compose_in_registration_order() {
        let mut chain = PluginChain::new();
        chain.push(Tag("a"));
        chain.push(Tag("b"));

        let req = chain.pre_invoke(InvokeRequest::new()).unwrap();
        assert_eq!(req.get("trail"), Some(&json!("a,b")));
        assert_eq!(chain.names(), vec!["a", "b"]);
    }

    #[test]
    fn default_hooks_are_identity() {
        let mut chain = PluginChain::new();
        chain.push(Tag("only-pre"));
        let resp = chain.post_invoke(InvokeResponse::default()).unwrap();
        assert!(resp.events.is_empty());
    }

    #[test]
    fn hook_error_stops_the_chain() {
        let mut chain = PluginChain::new();
        chain.push(Failing);
        chain.push(Tag("never"));
        let err = chain.pre_invoke(InvokeRequest::new()).unwrap_err();
        assert_eq!(err.plugin, "failing");
    }
}
