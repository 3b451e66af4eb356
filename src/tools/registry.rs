use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::handler::ToolHandler;
use super::schema::ActionGroup;

/// Group used for tools registered without one.
pub const DEFAULT_GROUP: &str = "DefaultActions";

/// The three argument types the remote endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

/// Declared parameter of a tool, as written by the tool author.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    name: String,
    param_type: ParamType,
    description: Option<String>,
    required: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: true,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the parameter as having a default, i.e. not required.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Resolved parameter description sent to the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDescriptor {
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub param_type: ParamType,
}

/// A tool definition under construction. Resolved into a [`Tool`] on registration.
pub struct ToolDef {
    name: String,
    description: Option<String>,
    doc: Option<String>,
    group: Option<String>,
    params: Vec<ParamSpec>,
    handler: Box<dyn ToolHandler>,
}

impl ToolDef {
    pub fn new(name: impl Into<String>, handler: impl ToolHandler + 'static) -> Self {
        Self {
            name: name.into(),
            description: None,
            doc: None,
            group: None,
            params: Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Explicit description. Wins over anything taken from `doc`.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Docstring-style documentation. The first line becomes the description
    /// and `:param <name>: <text>` lines describe parameters.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    fn resolve(self) -> Tool {
        let doc = self.doc.as_deref().unwrap_or("");
        let description = self
            .description
            .or_else(|| {
                doc.trim()
                    .lines()
                    .next()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
            })
            .unwrap_or_else(|| format!("Execute the {} function", self.name));

        let parameters = self
            .params
            .into_iter()
            .map(|p| {
                let description = p
                    .description
                    .or_else(|| doc_param(doc, &p.name))
                    .unwrap_or_else(|| format!("The {} parameter", p.name));
                ParameterDescriptor {
                    name: p.name,
                    description,
                    required: p.required,
                    param_type: p.param_type,
                }
            })
            .collect();

        Tool {
            name: self.name,
            description,
            group: self.group.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            parameters,
            handler: self.handler,
        }
    }
}

/// Find `:param <name>: <text>` in a docstring. The last match wins.
fn doc_param(doc: &str, name: &str) -> Option<String> {
    let marker = format!(":param {name}:");
    doc.lines()
        .filter_map(|line| line.trim().strip_prefix(marker.as_str()))
        .last()
        .map(|rest| rest.trim().to_string())
}

/// A registered tool. Immutable for the duration of a run.
pub struct Tool {
    pub name: String,
    pub description: String,
    pub group: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub(crate) handler: Box<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("group", &self.group)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Catalog of available tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    /// Descriptions of groups registered as a unit.
    groups: Vec<(String, String)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ToolRegistry::register`].
    pub fn add(mut self, def: ToolDef) -> Self {
        self.register(def);
        self
    }

    /// Builder form of [`ToolRegistry::register_group`].
    pub fn add_group(mut self, group: ActionGroup) -> Self {
        self.register_group(group);
        self
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, def: ToolDef) -> &Tool {
        let tool = def.resolve();
        debug!(tool = %tool.name, group = %tool.group, "registering tool");

        match self.tools.iter().position(|t| t.name == tool.name) {
            Some(idx) => {
                warn!(tool = %tool.name, "tool re-registered, replacing earlier definition");
                self.tools[idx] = tool;
                &self.tools[idx]
            }
            None => {
                self.tools.push(tool);
                let last = self.tools.len() - 1;
                &self.tools[last]
            }
        }
    }

    /// Register every tool of a declared group under the group's name.
    pub fn register_group(&mut self, group: ActionGroup) {
        let ActionGroup {
            name,
            description,
            tools,
        } = group;

        match self.groups.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = description,
            None => self.groups.push((name.clone(), description)),
        }
        for def in tools {
            self.register(def.group(name.clone()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Declared description of a group, if it was registered as a unit.
    pub fn group_description(&self, group: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(n, _)| n == group)
            .map(|(_, d)| d.as_str())
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}
