//! Minimal Permit.io client for tollgate
//!
//! This crate talks to two services: the policy decision point, which
//! answers "may this user do this?", and the facts / elements API, which
//! holds users, role bindings, resource instances and the approval
//! workflow records.
//!
//! # Quick Start
//!
//! ```no_run
//! // Requires PERMIT_API_KEY, PROJECT_ID, ENV_ID and friends in the environment
//! use tollgate_permit::{ApprovalStatus, ListParams, PermitClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PermitClient::from_env()?;
//!
//! if client.check("henry", "read", "restaurants:3").await? {
//!     println!("henry may look at the menu");
//! }
//!
//! let pending = client
//!     .access_requests()
//!     .list("joe", &ListParams::new().status(ApprovalStatus::Pending))
//!     .await?;
//! println!("{} requests waiting", pending.len());
//! # Ok(())
//! # }
//! ```
//!
//! The client never retries on its own; callers decide.

pub mod approvals;
pub mod client;
pub mod config;
pub mod error;

pub use approvals::{
    AccessRequest, AccessRequests, ApprovalRecord, ApprovalStatus, ListParams, OperationApproval,
    OperationApprovals, DEFAULT_PAGE, DEFAULT_PER_PAGE, MAX_PER_PAGE,
};
pub use client::{ActAsToken, PermitClient, PolicyDecisionPoint, DEFAULT_INSTANCES_PER_PAGE};
pub use config::PermitConfig;
pub use error::PermitError;
