//! Role-based visibility of tools
//!
//! A caller only ever sees the tools its role is entitled to. Roles listed
//! as unrestricted see everything, roles with an allow-list see the listed
//! names, and any other role sees nothing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::FunctionDeclaration;
use crate::types::ToolDefinition;

/// The role that sees every registered tool by default
pub const PARENT_ROLE: &str = "parent";

/// The restricted role
pub const CHILD_ROLE: &str = "child";

/// Tools visible to the restricted role by default
pub const CHILD_TOOLS: [&str; 5] = [
    "list_resource_instances",
    "create_operation_approval",
    "create_access_request",
    "list_dishes",
    "order_dish",
];

/// Anything that carries a tool name
pub trait NamedTool {
    fn tool_name(&self) -> &str;
}

impl NamedTool for ToolDefinition {
    fn tool_name(&self) -> &str {
        &self.name
    }
}

impl NamedTool for FunctionDeclaration {
    fn tool_name(&self) -> &str {
        &self.name
    }
}

impl NamedTool for String {
    fn tool_name(&self) -> &str {
        self
    }
}

/// Per-role tool allow-lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFilter {
    /// Roles that receive the unfiltered tool list
    #[serde(default)]
    pub unrestricted: BTreeSet<String>,

    /// Role name to the tool names it may see
    #[serde(default)]
    pub allow_lists: BTreeMap<String, BTreeSet<String>>,
}

impl Default for RoleFilter {
    fn default() -> Self {
        Self::empty()
            .with_unrestricted(PARENT_ROLE)
            .with_allow_list(CHILD_ROLE, CHILD_TOOLS)
    }
}

impl RoleFilter {
    /// A filter that knows no roles and so denies everything
    pub fn empty() -> Self {
        Self {
            unrestricted: BTreeSet::new(),
            allow_lists: BTreeMap::new(),
        }
    }

    pub fn with_unrestricted(mut self, role: impl Into<String>) -> Self {
        self.unrestricted.insert(role.into());
        self
    }

    pub fn with_allow_list<I, S>(mut self, role: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_lists
            .insert(role.into(), tools.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the role is known to this filter at all
    pub fn is_known(&self, role: &str) -> bool {
        self.unrestricted.contains(role) || self.allow_lists.contains_key(role)
    }

    /// Whether a caller with `role` may see the tool named `tool`
    pub fn permits(&self, role: &str, tool: &str) -> bool {
        if self.unrestricted.contains(role) {
            return true;
        }
        self.allow_lists
            .get(role)
            .is_some_and(|allowed| allowed.contains(tool))
    }

    /// Keep the tools `role` may see, preserving their order
    pub fn filter<T: NamedTool + Clone>(&self, tools: &[T], role: &str) -> Vec<T> {
        if !self.is_known(role) {
            log::debug!("unknown role '{}' sees no tools", role);
            return Vec::new();
        }

        tools
            .iter()
            .filter(|t| self.permits(role, t.tool_name()))
            .cloned()
            .collect()
    }
}
