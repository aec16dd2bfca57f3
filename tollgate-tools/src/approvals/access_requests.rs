use std::sync::Arc;

use tollgate_permit::PermitClient;

use crate::approvals::{api_error, default_page, default_per_page, list_params};
use crate::prelude::*;

/// Input for creating an access request
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateAccessRequestInput {
    /// ID of the user asking for access
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// Role being requested (e.g. "child-can-order")
    pub role: String,

    /// Why the user needs the role
    pub reason: String,

    /// Resource instance key the role applies to (e.g. "3")
    #[serde(default)]
    pub resource_instance: Option<String>,
}

/// Tool for asking for a role on a resource instance
pub struct CreateAccessRequestTool {
    client: Arc<PermitClient>,
}

impl CreateAccessRequestTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for CreateAccessRequestTool {
    type Input = CreateAccessRequestInput;

    fn name(&self) -> &str {
        "create_access_request"
    }

    fn description(&self) -> &str {
        "Request a role on a resource instance. A reviewer must approve the request before the role is granted."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        self.client
            .access_requests()
            .create(
                &input.user_id,
                &input.role,
                &input.reason,
                input.resource_instance.as_deref(),
            )
            .await
            .map_err(api_error)?;

        Ok("Your request has been successfully sent".into())
    }
}

/// Input for listing access requests
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListAccessRequestsInput {
    /// ID of the user whose view of the requests is listed
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// Only requests in this state: pending, approved, denied or canceled
    #[serde(default)]
    pub status: Option<String>,

    /// Only requests for this role
    #[serde(default)]
    pub role: Option<String>,

    /// Only requests for this resource instance key
    #[serde(default)]
    pub resource_instance: Option<String>,

    /// Page number, starting at 1
    #[serde(default = "default_page")]
    pub page: u32,

    /// Number of requests per page (at most 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Tool for listing access requests
pub struct ListAccessRequestsTool {
    client: Arc<PermitClient>,
}

impl ListAccessRequestsTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for ListAccessRequestsTool {
    type Input = ListAccessRequestsInput;

    fn name(&self) -> &str {
        "list_access_requests"
    }

    fn description(&self) -> &str {
        "List access requests, optionally filtered by status, role and resource instance. Each request includes the requesting user's details."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        let params = list_params(
            input.status.as_deref(),
            input.role.as_deref(),
            input.resource_instance.as_deref(),
            input.page,
            input.per_page,
        )?;

        let requests = self
            .client
            .access_requests()
            .list(&input.user_id, &params)
            .await
            .map_err(api_error)?;

        Ok(ToolResult::json(requests)?)
    }
}

/// Input for approving or denying an access request
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReviewAccessRequestInput {
    /// ID of the reviewing user
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// ID of the access request to review
    pub access_request_id: String,

    /// Comment shown to the requester
    #[serde(default)]
    pub reviewer_comment: Option<String>,
}

/// Tool for approving a pending access request
pub struct ApproveAccessRequestTool {
    client: Arc<PermitClient>,
}

impl ApproveAccessRequestTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for ApproveAccessRequestTool {
    type Input = ReviewAccessRequestInput;

    fn name(&self) -> &str {
        "approve_access_request"
    }

    fn description(&self) -> &str {
        "Approve a pending access request, granting the requested role."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        self.client
            .access_requests()
            .approve(
                &input.user_id,
                &input.access_request_id,
                input.reviewer_comment.as_deref(),
            )
            .await
            .map_err(api_error)?;

        Ok("Access request approved successfully.".into())
    }
}

/// Tool for denying a pending access request
pub struct DenyAccessRequestTool {
    client: Arc<PermitClient>,
}

impl DenyAccessRequestTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for DenyAccessRequestTool {
    type Input = ReviewAccessRequestInput;

    fn name(&self) -> &str {
        "deny_access_request"
    }

    fn description(&self) -> &str {
        "Deny a pending access request."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        self.client
            .access_requests()
            .deny(
                &input.user_id,
                &input.access_request_id,
                input.reviewer_comment.as_deref(),
            )
            .await
            .map_err(api_error)?;

        Ok("Access request denied successfully.".into())
    }
}
