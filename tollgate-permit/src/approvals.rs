//! Access requests and operation approvals
//!
//! Both families share a create / list / approve / deny lifecycle:
//!
//! ```text
//!            approve
//! pending ──────────▶ approved
//!    │  │    deny
//!    │  └───────────▶ denied
//!    └──────────────▶ canceled
//! ```
//!
//! Access requests ask for a persistent role on a resource and are sent
//! with the service key. Operation approvals ask for a single privileged
//! action and are sent on behalf of the acting user.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use reqwest::Url;
use serde_json::{Map, Value};

use crate::client::PermitClient;
use crate::error::PermitError;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 30;
pub const MAX_PER_PAGE: u32 = 100;

/// Reject pagination the API would refuse, before sending anything
pub(crate) fn validate_page(page: u32, per_page: u32) -> Result<(), PermitError> {
    if page < 1 {
        return Err(PermitError::InvalidRequest(format!(
            "page must be at least 1, got {}",
            page
        )));
    }
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(PermitError::InvalidRequest(format!(
            "per_page must be between 1 and {}, got {}",
            MAX_PER_PAGE, per_page
        )));
    }
    Ok(())
}

/// Lifecycle state of an approval record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Canceled,
}

impl ApprovalStatus {
    /// Terminal states never transition again
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Denied => "denied",
            ApprovalStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = PermitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "denied" => Ok(ApprovalStatus::Denied),
            "canceled" | "cancelled" => Ok(ApprovalStatus::Canceled),
            other => Err(PermitError::InvalidRequest(format!(
                "unknown status '{}', expected pending, approved, denied or canceled",
                other
            ))),
        }
    }
}

/// An access request or operation approval as returned by the API
///
/// Fields the API adds beyond the ones named here are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: String,
    #[serde(default)]
    pub requesting_user_id: Option<String>,
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reviewer_comment: Option<String>,
    #[serde(default)]
    pub access_request_details: Option<Value>,
    /// The requester's user record, resolved after listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requesting_user: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type AccessRequest = ApprovalRecord;
pub type OperationApproval = ApprovalRecord;

/// Filters and pagination for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub status: Option<ApprovalStatus>,
    /// Only meaningful for access requests
    pub role: Option<String>,
    pub resource_instance: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            status: None,
            role: None,
            resource_instance: None,
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ApprovalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn resource_instance(mut self, instance: impl Into<String>) -> Self {
        self.resource_instance = Some(instance.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn validate(&self) -> Result<(), PermitError> {
        validate_page(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize)]
struct RequestDetails<'a> {
    tenant: &'a str,
    resource: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_instance: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    access_request_details: RequestDetails<'a>,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct ReviewBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reviewer_comment: Option<&'a str>,
}

impl<'a> ReviewBody<'a> {
    fn new(comment: Option<&'a str>) -> Self {
        Self {
            reviewer_comment: comment.filter(|c| !c.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<ApprovalRecord>,
}

/// Replace each `requesting_user_id` with the user record it names
async fn resolve_requesters(
    client: &PermitClient,
    mut records: Vec<ApprovalRecord>,
) -> Result<Vec<ApprovalRecord>, PermitError> {
    let ids: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.requesting_user_id.as_deref())
        .filter(|id| !id.is_empty())
        .collect();

    let users = try_join_all(ids.into_iter().map(|id| async move {
        client.get_user(id).await.map(|user| (id.to_string(), user))
    }))
    .await?;
    let users: HashMap<String, Value> = users.into_iter().collect();

    for record in &mut records {
        if let Some(id) = &record.requesting_user_id {
            record.requesting_user = users.get(id).cloned();
        }
    }
    Ok(records)
}

// ============================================================================
// Access Requests API
// ============================================================================

/// Access requests API handle
pub struct AccessRequests<'a> {
    client: &'a PermitClient,
}

impl<'a> AccessRequests<'a> {
    pub(crate) fn new(client: &'a PermitClient) -> Self {
        Self { client }
    }

    fn url(&self, user: &str, tail: &[&str]) -> Result<Url, PermitError> {
        let config = self.client.config();
        let base = [
            "access_requests",
            config.access_elements_config_id.as_str(),
            "user",
            user,
            "tenant",
            config.tenant.as_str(),
        ];
        self.client.facts_url(&[&base[..], tail].concat())
    }

    /// Ask for `role` on the configured resource, optionally on one instance
    pub async fn create(
        &self,
        user: &str,
        role: &str,
        reason: &str,
        resource_instance: Option<&str>,
    ) -> Result<Value, PermitError> {
        let config = self.client.config();
        let body = CreateBody {
            access_request_details: RequestDetails {
                tenant: &config.tenant,
                resource: &config.resource_key,
                role: Some(role),
                resource_instance,
            },
            reason,
        };

        let request = self.client.http().post(self.url(user, &[])?).json(&body);
        let created = self
            .client
            .send_value("create_access_request", request, self.client.service_auth()?)
            .await?;
        log::info!("access request for role '{}' created by '{}'", role, user);
        Ok(created)
    }

    /// List access requests visible to `user`
    pub async fn list(
        &self,
        user: &str,
        params: &ListParams,
    ) -> Result<Vec<AccessRequest>, PermitError> {
        params.validate()?;

        let config = self.client.config();
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = params.status {
            query.push(("status", status.to_string()));
        }
        if let Some(role) = &params.role {
            query.push(("role", role.clone()));
        }
        query.push(("resource", config.resource_key.clone()));
        if let Some(instance) = &params.resource_instance {
            query.push(("resource_instance_id", instance.clone()));
        }
        query.push(("page", params.page.to_string()));
        query.push(("per_page", params.per_page.to_string()));

        let request = self.client.http().get(self.url(user, &[])?).query(&query);
        let page: Page = self
            .client
            .send_json("list_access_requests", request, self.client.service_auth()?)
            .await?;

        resolve_requesters(self.client, page.data).await
    }

    pub async fn approve(
        &self,
        user: &str,
        request_id: &str,
        reviewer_comment: Option<&str>,
    ) -> Result<Value, PermitError> {
        self.review("approve_access_request", "approve", user, request_id, reviewer_comment)
            .await
    }

    pub async fn deny(
        &self,
        user: &str,
        request_id: &str,
        reviewer_comment: Option<&str>,
    ) -> Result<Value, PermitError> {
        self.review("deny_access_request", "deny", user, request_id, reviewer_comment)
            .await
    }

    async fn review(
        &self,
        operation: &'static str,
        verb: &str,
        user: &str,
        request_id: &str,
        reviewer_comment: Option<&str>,
    ) -> Result<Value, PermitError> {
        let url = self.url(user, &[request_id, verb])?;
        let request = self
            .client
            .http()
            .put(url)
            .json(&ReviewBody::new(reviewer_comment));

        let reviewed = self
            .client
            .send_value(operation, request, self.client.service_auth()?)
            .await?;
        log::info!("access request '{}' {} by '{}'", request_id, verb, user);
        Ok(reviewed)
    }
}

// ============================================================================
// Operation Approvals API
// ============================================================================

/// Operation approvals API handle
pub struct OperationApprovals<'a> {
    client: &'a PermitClient,
}

impl<'a> OperationApprovals<'a> {
    pub(crate) fn new(client: &'a PermitClient) -> Self {
        Self { client }
    }

    fn url(&self, tail: &[&str]) -> Result<Url, PermitError> {
        let base = [
            "config",
            self.client.config().operation_elements_config_id.as_str(),
            "operation_approval",
        ];
        self.client.elements_url(&[&base[..], tail].concat())
    }

    /// Ask for a one-time exception, on behalf of `user`
    pub async fn create(
        &self,
        user: &str,
        reason: &str,
        resource_instance: Option<&str>,
    ) -> Result<Value, PermitError> {
        let token = self.client.act_as(user).await?;
        let config = self.client.config();
        let body = CreateBody {
            access_request_details: RequestDetails {
                tenant: &config.tenant,
                resource: &config.resource_key,
                role: None,
                resource_instance,
            },
            reason,
        };

        let request = self.client.http().post(self.url(&[])?).json(&body);
        let created = self
            .client
            .send_value(
                "create_operation_approval",
                request,
                self.client.token_auth(&token)?,
            )
            .await?;
        log::info!("operation approval created by '{}'", user);
        Ok(created)
    }

    /// List operation approvals visible to `user`
    ///
    /// Only the status and resource instance filters apply here.
    pub async fn list(
        &self,
        user: &str,
        params: &ListParams,
    ) -> Result<Vec<OperationApproval>, PermitError> {
        params.validate()?;
        if params.role.is_some() {
            return Err(PermitError::InvalidRequest(
                "operation approvals cannot be filtered by role".to_string(),
            ));
        }

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = params.status {
            query.push(("status", status.to_string()));
        }
        if let Some(instance) = &params.resource_instance {
            query.push(("resource_instance", instance.clone()));
        }
        query.push(("page", params.page.to_string()));
        query.push(("per_page", params.per_page.to_string()));

        let token = self.client.act_as(user).await?;
        let request = self.client.http().get(self.url(&[])?).query(&query);
        let page: Page = self
            .client
            .send_json(
                "list_operation_approvals",
                request,
                self.client.token_auth(&token)?,
            )
            .await?;

        resolve_requesters(self.client, page.data).await
    }

    pub async fn approve(
        &self,
        user: &str,
        approval_id: &str,
        reviewer_comment: Option<&str>,
    ) -> Result<Value, PermitError> {
        self.review(
            "approve_operation_approval",
            "approve",
            user,
            approval_id,
            reviewer_comment,
        )
        .await
    }

    pub async fn deny(
        &self,
        user: &str,
        approval_id: &str,
        reviewer_comment: Option<&str>,
    ) -> Result<Value, PermitError> {
        self.review(
            "deny_operation_approval",
            "deny",
            user,
            approval_id,
            reviewer_comment,
        )
        .await
    }

    async fn review(
        &self,
        operation: &'static str,
        verb: &str,
        user: &str,
        approval_id: &str,
        reviewer_comment: Option<&str>,
    ) -> Result<Value, PermitError> {
        let token = self.client.act_as(user).await?;
        let url = self.url(&[approval_id, verb])?;
        let request = self
            .client
            .http()
            .put(url)
            .json(&ReviewBody::new(reviewer_comment));

        let reviewed = self
            .client
            .send_value(operation, request, self.client.token_auth(&token)?)
            .await?;
        log::info!("operation approval '{}' {} by '{}'", approval_id, verb, user);
        Ok(reviewed)
    }
}
