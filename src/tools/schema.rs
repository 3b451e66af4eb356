use serde::{Serialize, Serializer};

use super::registry::{ParameterDescriptor, ToolDef, ToolRegistry};

pub const CODE_INTERPRETER_GROUP: &str = "CodeInterpreterAction";
pub const CODE_INTERPRETER_SIGNATURE: &str = "AMAZON.CodeInterpreter";
const RETURN_CONTROL: &str = "RETURN_CONTROL";
const CONFIRMATION_DISABLED: &str = "DISABLED";

/// A named bundle of tools registered together.
pub struct ActionGroup {
    pub name: String,
    pub description: String,
    pub tools: Vec<ToolDef>,
}

impl ActionGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools: Vec::new(),
        }
    }

    pub fn tool(mut self, def: ToolDef) -> Self {
        self.tools.push(def);
        self
    }
}

/// Wire descriptor of one action group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupDescriptor {
    pub action_group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_group_executor: Option<ActionGroupExecutor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_schema: Option<FunctionSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_action_group_signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupExecutor {
    pub custom_control: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSchema {
    pub functions: Vec<FunctionDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    /// Serialized as a map keyed by parameter name, in declaration order.
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "parameter_map"
    )]
    pub parameters: Vec<ParameterDescriptor>,
    pub require_confirmation: String,
}

fn parameter_map<S: Serializer>(
    params: &[ParameterDescriptor],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(params.iter().map(|p| (&p.name, p)))
}

/// Partition the registry by group and emit one descriptor per group.
///
/// Groups appear in order of first registration, tools in registration order.
/// Every tool lands in exactly one descriptor.
pub fn build_action_groups(
    registry: &ToolRegistry,
    enable_code_interpreter: bool,
) -> Vec<ActionGroupDescriptor> {
    let mut groups: Vec<ActionGroupDescriptor> = Vec::new();

    for tool in registry.tools() {
        let idx = match groups
            .iter()
            .position(|g| g.action_group_name == tool.group)
        {
            Some(idx) => idx,
            None => {
                let description = registry
                    .group_description(&tool.group)
                    .map(String::from)
                    .unwrap_or_else(|| {
                        format!("Actions related to {}", tool.group.replace("Actions", ""))
                    });
                groups.push(ActionGroupDescriptor {
                    action_group_name: tool.group.clone(),
                    description: Some(description),
                    action_group_executor: Some(ActionGroupExecutor {
                        custom_control: RETURN_CONTROL.into(),
                    }),
                    function_schema: Some(FunctionSchema {
                        functions: Vec::new(),
                    }),
                    parent_action_group_signature: None,
                });
                groups.len() - 1
            }
        };

        if let Some(schema) = groups[idx].function_schema.as_mut() {
            schema.functions.push(FunctionDescriptor {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
                require_confirmation: CONFIRMATION_DISABLED.into(),
            });
        }
    }

    if enable_code_interpreter {
        groups.push(ActionGroupDescriptor {
            action_group_name: CODE_INTERPRETER_GROUP.into(),
            description: None,
            action_group_executor: None,
            function_schema: None,
            parent_action_group_signature: Some(CODE_INTERPRETER_SIGNATURE.into()),
        });
    }

    groups
}
