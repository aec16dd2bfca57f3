use std::sync::Arc;

use tollgate_permit::PermitClient;

use crate::approvals::{api_error, default_page, default_per_page, list_params};
use crate::prelude::*;

/// Input for creating an operation approval
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateOperationApprovalInput {
    /// ID of the user asking for the exception
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// Why the exception is needed
    pub reason: String,

    /// Resource instance key the exception applies to (e.g. "3")
    #[serde(default)]
    pub resource_instance: Option<String>,
}

/// Tool for asking for a one-time exception to a policy
pub struct CreateOperationApprovalTool {
    client: Arc<PermitClient>,
}

impl CreateOperationApprovalTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for CreateOperationApprovalTool {
    type Input = CreateOperationApprovalInput;

    fn name(&self) -> &str {
        "create_operation_approval"
    }

    fn description(&self) -> &str {
        "Request a one-time approval for an operation the user is not normally allowed to perform. The approval is used up by the next such operation."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        self.client
            .operation_approvals()
            .create(
                &input.user_id,
                &input.reason,
                input.resource_instance.as_deref(),
            )
            .await
            .map_err(api_error)?;

        Ok("Operation approval request created successfully.".into())
    }
}

/// Input for listing operation approvals
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListOperationApprovalsInput {
    /// ID of the user whose view of the approvals is listed
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// Only approvals in this state: pending, approved, denied or canceled
    #[serde(default)]
    pub status: Option<String>,

    /// Only approvals for this resource instance key
    #[serde(default)]
    pub resource_instance: Option<String>,

    /// Page number, starting at 1
    #[serde(default = "default_page")]
    pub page: u32,

    /// Number of approvals per page (at most 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Tool for listing operation approvals
pub struct ListOperationApprovalsTool {
    client: Arc<PermitClient>,
}

impl ListOperationApprovalsTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for ListOperationApprovalsTool {
    type Input = ListOperationApprovalsInput;

    fn name(&self) -> &str {
        "list_operation_approvals"
    }

    fn description(&self) -> &str {
        "List operation approval requests, optionally filtered by status and resource instance. Each request includes the requesting user's details."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        let params = list_params(
            input.status.as_deref(),
            None,
            input.resource_instance.as_deref(),
            input.page,
            input.per_page,
        )?;

        let approvals = self
            .client
            .operation_approvals()
            .list(&input.user_id, &params)
            .await
            .map_err(api_error)?;

        Ok(ToolResult::json(approvals)?)
    }
}

/// Input for approving or denying an operation approval
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReviewOperationApprovalInput {
    /// ID of the reviewing user
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// ID of the operation approval to review
    pub operation_approval_id: String,

    /// Comment shown to the requester
    #[serde(default)]
    pub reviewer_comment: Option<String>,
}

/// Tool for approving a pending operation approval
pub struct ApproveOperationApprovalTool {
    client: Arc<PermitClient>,
}

impl ApproveOperationApprovalTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for ApproveOperationApprovalTool {
    type Input = ReviewOperationApprovalInput;

    fn name(&self) -> &str {
        "approve_operation_approval"
    }

    fn description(&self) -> &str {
        "Approve a pending operation approval request, allowing the operation once."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        self.client
            .operation_approvals()
            .approve(
                &input.user_id,
                &input.operation_approval_id,
                input.reviewer_comment.as_deref(),
            )
            .await
            .map_err(api_error)?;

        Ok("Operation approval request approved successfully.".into())
    }
}

/// Tool for denying a pending operation approval
pub struct DenyOperationApprovalTool {
    client: Arc<PermitClient>,
}

impl DenyOperationApprovalTool {
    pub fn new(client: Arc<PermitClient>) -> Self {
        Self { client }
    }
}

impl Tool for DenyOperationApprovalTool {
    type Input = ReviewOperationApprovalInput;

    fn name(&self) -> &str {
        "deny_operation_approval"
    }

    fn description(&self) -> &str {
        "Deny a pending operation approval request."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        self.client
            .operation_approvals()
            .deny(
                &input.user_id,
                &input.operation_approval_id,
                input.reviewer_comment.as_deref(),
            )
            .await
            .map_err(api_error)?;

        Ok("Operation approval request denied successfully.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approvals::test_support::{client_for, OPERATION_PATH};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_login(server: &MockServer, user: &str) {
        Mock::given(method("POST"))
            .and(path("/v2/auth/elements_login_as"))
            .and(body_json(json!({"user_id": user, "tenant_id": "default"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"token": format!("tok-{user}")})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_operation_approval_acts_as_user() {
        let server = MockServer::start().await;
        mount_login(&server, "henry").await;
        Mock::given(method("POST"))
            .and(path(OPERATION_PATH))
            .and(header("authorization", "Bearer tok-henry"))
            .and(body_json(json!({
                "access_request_details": {
                    "tenant": "default",
                    "resource": "restaurants",
                    "resource_instance": "3"
                },
                "reason": "birthday sushi"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "oa_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let tool = CreateOperationApprovalTool::new(client_for(&server));
        let input = serde_json::from_value(json!({
            "user_id": "henry",
            "reason": "birthday sushi",
            "resource_instance": "3"
        }))
        .unwrap();

        let result = tool.execute(input).await.unwrap();
        assert_eq!(
            result.as_text(),
            "Operation approval request created successfully."
        );
    }

    #[tokio::test]
    async fn test_list_operation_approvals_resolves_requesters() {
        let server = MockServer::start().await;
        mount_login(&server, "joe").await;
        Mock::given(method("GET"))
            .and(path(OPERATION_PATH))
            .and(query_param("status", "pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "oa_1", "status": "pending", "requesting_user_id": "henry"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/facts/proj/env/users/henry"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key": "henry", "first_name": "Henry"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tool = ListOperationApprovalsTool::new(client_for(&server));
        let input = serde_json::from_value(json!({"user_id": "joe", "status": "pending"})).unwrap();

        let value = match tool.execute(input).await.unwrap() {
            ToolResult::Json(value) => value,
            other => panic!("expected JSON, got {:?}", other),
        };
        assert_eq!(value[0]["id"], "oa_1");
        assert_eq!(value[0]["requesting_user"]["first_name"], "Henry");
    }

    #[tokio::test]
    async fn test_approve_and_deny_operation_approval() {
        let server = MockServer::start().await;
        mount_login(&server, "joe").await;
        Mock::given(method("PUT"))
            .and(path(format!("{}/oa_1/approve", OPERATION_PATH)))
            .and(header("authorization", "Bearer tok-joe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "oa_1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("{}/oa_2/deny", OPERATION_PATH)))
            .and(body_json(json!({"reviewer_comment": "not today"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "oa_2"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let approve = ApproveOperationApprovalTool::new(client.clone());
        let input = serde_json::from_value(json!({
            "user_id": "joe",
            "operation_approval_id": "oa_1"
        }))
        .unwrap();
        assert_eq!(
            approve.execute(input).await.unwrap().as_text(),
            "Operation approval request approved successfully."
        );

        let deny = DenyOperationApprovalTool::new(client);
        let input = serde_json::from_value(json!({
            "user_id": "joe",
            "operation_approval_id": "oa_2",
            "reviewer_comment": "not today"
        }))
        .unwrap();
        assert_eq!(
            deny.execute(input).await.unwrap().as_text(),
            "Operation approval request denied successfully."
        );
    }

    #[tokio::test]
    async fn test_login_failure_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/auth/elements_login_as"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
            .mount(&server)
            .await;

        let tool = CreateOperationApprovalTool::new(client_for(&server));
        let input = serde_json::from_value(json!({"user_id": "ghost", "reason": "x"})).unwrap();

        let err = tool.execute(input).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
