use serde_json::{json, Map, Value};

use super::AgentPlugin;
use crate::error::PluginError;
use crate::types::InvokeRequest;

/// Appends a knowledge base to the request's `knowledgeBases` list.
pub struct KnowledgeBasePlugin {
    knowledge_base_id: String,
    description: Option<String>,
    retrieval_config: Map<String, Value>,
}

impl KnowledgeBasePlugin {
    pub fn new(knowledge_base_id: impl Into<String>) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.into(),
            description: None,
            retrieval_config: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_retrieval_config(mut self, config: Map<String, Value>) -> Self {
        self.retrieval_config = config;
        self
    }
}

impl AgentPlugin for KnowledgeBasePlugin {
    fn name(&self) -> &str {
        "knowledge-base"
    }

    fn pre_invoke(&self, mut request: InvokeRequest) -> Result<InvokeRequest, PluginError> {
        let mut kb = json!({ "knowledgeBaseId": self.knowledge_base_id });
        if let Some(ref description) = self.description {
            kb["description"] = Value::String(description.clone());
        }
        if !self.retrieval_config.is_empty() {
            kb["retrievalConfiguration"] = Value::Object(self.retrieval_config.clone());
        }

        match request.get_mut("knowledgeBases") {
            Some(Value::Array(list)) => list.push(kb),
            Some(_) => {
                return Err(PluginError::new(
                    self.name(),
                    "request field 'knowledgeBases' is not a list",
                ))
            }
            None => {
                request.insert("knowledgeBases", Value::Array(vec![kb]));
            }
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginChain;

    #[test]
    fn creates_list() {
        let req = KnowledgeBasePlugin::new("kb-1")
            .with_description("Product docs")
            .pre_invoke(InvokeRequest::new())
            .unwrap();
        assert_eq!(
            req.get("knowledgeBases"),
            Some(&json!([{"knowledgeBaseId": "kb-1", "description": "Product docs"}]))
        );
    }

    #[test]
    fn appends_in_chain_order() {
        let mut chain = PluginChain::new();
        let mut retrieval = Map::new();
        retrieval.insert("vectorSearchConfiguration".into(), json!({"numberOfResults": 5}));
        chain.push(KnowledgeBasePlugin::new("kb-1"));
        chain.push(KnowledgeBasePlugin::new("kb-2").with_retrieval_config(retrieval));

        let req = chain.pre_invoke(InvokeRequest::new()).unwrap();
        let kbs = req.get("knowledgeBases").unwrap().as_array().unwrap();
        assert_eq!(kbs.len(), 2);
        assert_eq!(kbs[0]["knowledgeBaseId"], "kb-1");
        assert_eq!(
            kbs[1]["retrievalConfiguration"]["vectorSearchConfiguration"]["numberOfResults"],
            5
        );
    }

    #[test]
    fn rejects_malformed_field() {
        let mut req = InvokeRequest::new();
        req.insert("knowledgeBases", json!("oops"));
        assert!(KnowledgeBasePlugin::new("kb").pre_invoke(req).is_err());
    }
}
