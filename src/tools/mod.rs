pub mod convert;
pub mod executor;
pub mod handler;
pub mod registry;
pub mod schema;

pub use convert::convert_parameters;
pub use executor::ExecutionError;
pub use handler::{Args, FnHandler, ToolError, ToolHandler};
pub use registry::{
    ParamSpec, ParamType, ParameterDescriptor, Tool, ToolDef, ToolRegistry, DEFAULT_GROUP,
};
pub use schema::{build_action_groups, ActionGroup, ActionGroupDescriptor};
