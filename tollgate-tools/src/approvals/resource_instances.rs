use std::sync::Arc;

use tollgate_permit::{PermitClient, DEFAULT_INSTANCES_PER_PAGE};

use crate::approvals::api_error;
use crate::prelude::*;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_INSTANCES_PER_PAGE
}

/// Input for listing resource instances
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListResourceInstancesInput {
    /// Page number, starting at 1
    #[serde(default = "default_page")]
    pub page: u32,

    /// Number of instances per page (at most 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Tool for listing instances of the configured resource type
pub struct ListResourceInstancesTool {
    client: Arc<PermitClient>,
}

impl ListResourceInstancesTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for ListResourceInstancesTool {
    type Input = ListResourceInstancesInput;

    fn name(&self) -> &str {
        "list_resource_instances"
    }

    fn description(&self) -> &str {
        "List the resource instances (e.g. restaurants) that access requests and operation approvals can refer to."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        let instances = self
            .client
            .list_resource_instances(input.page, input.per_page)
            .await
            .map_err(api_error)?;

        Ok(ToolResult::Json(instances))
    }
}
