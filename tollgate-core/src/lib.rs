//! # Tollgate
//!
//! A permission-gated tool layer between a function-calling agent and an
//! external policy decision point.
//!
//! Tollgate decides which tools a caller's role may see, rewrites their
//! parameter schemas into the dialect function-calling models accept, and
//! executes the calls the model makes with a bounded retry.
//!
//! ## Defining tools
//!
//! Implement the [`Tool`] trait; the parameter schema is derived from the
//! input type:
//!
//! ```rust
//! use tollgate_core::{Tool, ToolError, ToolResult, ToolRegistry};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct LookupInput {
//!     /// Restaurant to look up
//!     restaurant_id: String,
//! }
//!
//! struct Lookup;
//!
//! impl Tool for Lookup {
//!     type Input = LookupInput;
//!
//!     fn name(&self) -> &str { "lookup" }
//!     fn description(&self) -> &str { "Look up a restaurant" }
//!
//!     async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
//!         Ok(ToolResult::text(format!("restaurant {}", input.restaurant_id)))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Lookup).unwrap();
//! assert_eq!(registry.declarations().unwrap()[0].name, "lookup");
//! ```
//!
//! ## Running calls
//!
//! ```rust
//! use tollgate_core::{ToolCall, ToolInvoker, ToolRegistry};
//! use serde_json::json;
//!
//! # async fn example(registry: ToolRegistry) {
//! let invoker = ToolInvoker::new(registry);
//! let response = invoker.invoke(ToolCall::new("lookup", json!({"restaurant_id": "1"}))).await;
//! println!("{}", serde_json::to_string(&response).unwrap());
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `test-utils` - Mock model and executor for downstream tests

pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod invoker;
pub mod registry;
pub mod role;
pub mod schema;
pub mod session;
pub mod tool;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{expand_env_vars, load_config_file, ConfigError, TollgateConfig};
pub use conversation::{FunctionCallingModel, ModelError, TurnDriver, TurnError};
pub use error::{Error, Result};
pub use events::{ToolEvent, ToolHook};
pub use invoker::{
    CallOutcome, FunctionResponse, InvokeError, ResponseBody, TextContent, ToolCallResult,
    ToolExecutor, ToolInvoker, DEFAULT_MAX_ATTEMPTS, EXHAUSTED_MESSAGE,
};
pub use registry::{RegistryError, ToolRegistry};
pub use role::{NamedTool, RoleFilter, CHILD_ROLE, CHILD_TOOLS, PARENT_ROLE};
pub use schema::{
    translate_parameters, translate_tool, translate_tools, FunctionDeclaration, SchemaError,
};
pub use session::{SessionError, SessionMessage, SessionReceiver, SessionRegistry};
pub use tool::{box_tool, DynTool, Tool, ToolError, ToolResult};
pub use types::{Message, Part, ResourceInstance, Role, Subject, ToolCall, ToolDefinition};
