//! The process-wide table of tools
//!
//! Tools are registered once at startup. Names on the exclusion list are
//! still registered, so business logic can reach them in-process, but they
//! are never advertised to the agent and the agent cannot call them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::invoker::{CallOutcome, InvokeError, ToolExecutor};
use crate::schema::{translate_tool, FunctionDeclaration, SchemaError};
use crate::tool::{box_tool, DynTool, Tool, ToolError, ToolResult};
use crate::types::ToolDefinition;

/// Errors raised while building the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

struct Entry {
    handler: Arc<dyn DynTool>,
    exposed: bool,
}

/// Name to handler table with an exposure flag per tool
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    excluded: HashSet<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that hides the named tools from the agent
    pub fn with_exclusions<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Register a typed tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_boxed(box_tool(tool))
    }

    /// Register an already type-erased tool
    pub fn register_boxed(&mut self, tool: Box<dyn DynTool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        translate_tool(self.entries.len(), &tool.definition())?;

        let exposed = !self.excluded.contains(&name);
        log::debug!("registered tool '{}' (exposed: {})", name, exposed);

        self.index.insert(name, self.entries.len());
        self.entries.push(Entry {
            handler: Arc::from(tool),
            exposed,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the tool is registered and visible to the agent
    pub fn is_exposed(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&i| self.entries[i].exposed)
    }

    /// Definitions of exposed tools, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .filter(|e| e.exposed)
            .map(|e| e.handler.definition())
            .collect()
    }

    /// Translated declarations of exposed tools, in registration order
    pub fn declarations(&self) -> Result<Vec<FunctionDeclaration>, SchemaError> {
        crate::schema::translate_tools(&self.definitions())
    }

    /// Handler for any registered tool, including excluded ones
    pub fn handler(&self, name: &str) -> Option<Arc<dyn DynTool>> {
        self.index.get(name).map(|&i| self.entries[i].handler.clone())
    }

    /// Run a registered tool in-process, bypassing the exclusion list
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolError> {
        let handler = self
            .handler(name)
            .ok_or_else(|| ToolError::Custom(format!("Tool '{}' not found", name)))?;
        handler.execute_raw(arguments).await
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallOutcome, InvokeError> {
        let handler = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .filter(|e| e.exposed)
            .map(|e| e.handler.clone())
            .ok_or_else(|| InvokeError::ToolNotFound(name.to_string()))?;

        match handler.execute_raw(arguments).await {
            Ok(result) => Ok(CallOutcome::text(result.as_text())),
            Err(ToolError::InvalidInput(message)) => Err(InvokeError::InvalidArguments {
                name: name.to_string(),
                message,
            }),
            Err(err) => Ok(CallOutcome::error(err.to_string())),
        }
    }
}
