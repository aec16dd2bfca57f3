//! Approval workflow tools backed by the Permit approvals API.
//!
//! Access requests ask for a persistent role on a resource instance and are
//! handled with the service key. Operation approvals ask for a one-time
//! exception and are handled with an act-as token for the calling user, so
//! the API attributes them to that user.
//!
//! # Available Tools
//!
//! | Tool | Description |
//! |------|-------------|
//! | [`ListResourceInstancesTool`] | List instances of the configured resource type |
//! | [`CreateAccessRequestTool`] | Ask for a role on a resource instance |
//! | [`ListAccessRequestsTool`] | List access requests with filters and paging |
//! | [`ApproveAccessRequestTool`] | Approve a pending access request |
//! | [`DenyAccessRequestTool`] | Deny a pending access request |
//! | [`CreateOperationApprovalTool`] | Ask for a one-time exception |
//! | [`ListOperationApprovalsTool`] | List operation approvals with filters and paging |
//! | [`ApproveOperationApprovalTool`] | Approve a pending operation approval |
//! | [`DenyOperationApprovalTool`] | Deny a pending operation approval |
//!
//! API failures come back as the tool error text, e.g.
//! `Request failed with status code 403: {"detail":"forbidden"}`.

mod access_requests;
mod operation_approvals;
mod resource_instances;

pub use access_requests::{
    ApproveAccessRequestTool, CreateAccessRequestTool, DenyAccessRequestTool,
    ListAccessRequestsTool,
};
pub use operation_approvals::{
    ApproveOperationApprovalTool, CreateOperationApprovalTool, DenyOperationApprovalTool,
    ListOperationApprovalsTool,
};
pub use resource_instances::ListResourceInstancesTool;

use std::sync::Arc;

use tollgate_core::tool::{box_tool, DynTool};
use tollgate_core::ToolError;
use tollgate_permit::{
    ApprovalStatus, ListParams, PermitClient, PermitError, DEFAULT_PAGE, DEFAULT_PER_PAGE,
};

/// Returns the resource lister and both approval families, in that order
pub fn all_tools(client: Arc<PermitClient>) -> Vec<Box<dyn DynTool>> {
    vec![
        box_tool(ListResourceInstancesTool::new(client.clone())),
        box_tool(CreateAccessRequestTool::new(client.clone())),
        box_tool(ListAccessRequestsTool::new(client.clone())),
        box_tool(ApproveAccessRequestTool::new(client.clone())),
        box_tool(DenyAccessRequestTool::new(client.clone())),
        box_tool(CreateOperationApprovalTool::new(client.clone())),
        box_tool(ListOperationApprovalsTool::new(client.clone())),
        box_tool(ApproveOperationApprovalTool::new(client.clone())),
        box_tool(DenyOperationApprovalTool::new(client)),
    ]
}

pub(crate) fn api_error(err: PermitError) -> ToolError {
    ToolError::Custom(err.to_string())
}

pub(crate) fn default_page() -> u32 {
    DEFAULT_PAGE
}

pub(crate) fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

/// Turn the loose tool arguments into validated list parameters
pub(crate) fn list_params(
    status: Option<&str>,
    role: Option<&str>,
    resource_instance: Option<&str>,
    page: u32,
    per_page: u32,
) -> Result<ListParams, ToolError> {
    let mut params = ListParams::new().page(page).per_page(per_page);

    if let Some(status) = status.filter(|s| !s.trim().is_empty()) {
        let status: ApprovalStatus = status.parse().map_err(api_error)?;
        params = params.status(status);
    }
    if let Some(role) = role.filter(|r| !r.trim().is_empty()) {
        params = params.role(role);
    }
    if let Some(instance) = resource_instance.filter(|i| !i.trim().is_empty()) {
        params = params.resource_instance(instance);
    }

    params.validate().map_err(api_error)?;
    Ok(params)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_from_arguments() {
        let params = list_params(Some("Pending"), None, Some("3"), 2, 10).unwrap();
        assert_eq!(params.status, Some(ApprovalStatus::Pending));
        assert_eq!(params.resource_instance.as_deref(), Some("3"));
        assert_eq!((params.page, params.per_page), (2, 10));
    }

    #[test]
    fn test_list_params_blank_filters_ignored() {
        let params = list_params(Some(""), Some(" "), None, 1, 30).unwrap();
        assert!(params.status.is_none());
        assert!(params.role.is_none());
    }

    #[test]
    fn test_list_params_rejects_bad_input() {
        assert!(list_params(Some("open"), None, None, 1, 30).is_err());
        assert!(list_params(None, None, None, 0, 30).is_err());

        let err = list_params(None, None, None, 1, 101).unwrap_err();
        assert!(err.to_string().contains("per_page"));
    }

    #[test]
    fn test_all_tools_order() {
        let names: Vec<String> = all_tools(test_support::offline_client())
            .iter()
            .map(|t| t.name().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "list_resource_instances",
                "create_access_request",
                "list_access_requests",
                "approve_access_request",
                "deny_access_request",
                "create_operation_approval",
                "list_operation_approvals",
                "approve_operation_approval",
                "deny_operation_approval",
            ]
        );
    }
}
