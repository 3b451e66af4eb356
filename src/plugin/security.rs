use serde_json::Value;

use super::AgentPlugin;
use crate::error::PluginError;
use crate::types::InvokeRequest;

/// Sets a customer-managed encryption key on outbound requests.
pub struct SecurityPlugin {
    customer_encryption_key_arn: Option<String>,
}

impl SecurityPlugin {
    pub fn new(customer_encryption_key_arn: Option<String>) -> Self {
        Self {
            customer_encryption_key_arn,
        }
    }
}

impl AgentPlugin for SecurityPlugin {
    fn name(&self) -> &str {
        "security"
    }

    fn pre_invoke(&self, mut request: InvokeRequest) -> Result<InvokeRequest, PluginError> {
        if let Some(ref arn) = self.customer_encryption_key_arn {
            if !request.contains_key("customerEncryptionKeyArn") {
                request.insert("customerEncryptionKeyArn", Value::String(arn.clone()));
            }
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sets_key_arn() {
        let req = SecurityPlugin::new(Some("arn:aws:kms:key/1".into()))
            .pre_invoke(InvokeRequest::new())
            .unwrap();
        assert_eq!(req.get("customerEncryptionKeyArn"), Some(&json!("arn:aws:kms:key/1")));
    }

    #[test]
    fn no_key_no_change() {
        let req = SecurityPlugin::new(None).pre_invoke(InvokeRequest::new()).unwrap();
        assert!(req.params().is_empty());
    }
}
