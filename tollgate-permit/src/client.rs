//! Permit PDP and facts API client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::approvals::{AccessRequests, OperationApprovals};
use crate::config::PermitConfig;
use crate::error::PermitError;

/// Default page size when listing resource instances
pub const DEFAULT_INSTANCES_PER_PAGE: u32 = 100;

// ============================================================================
// Policy decision seam
// ============================================================================

/// The policy calls business tools depend on
///
/// [`PermitClient`] implements this against the real PDP; tests can supply
/// an in-memory implementation.
#[async_trait]
pub trait PolicyDecisionPoint: Send + Sync {
    /// Whether `user` may perform `action` on `resource` (`"<type>:<key>"` or a bare type)
    async fn check(&self, user: &str, action: &str, resource: &str) -> Result<bool, PermitError>;

    /// Remove a role binding, e.g. to consume a one-time grant
    async fn unassign_role(
        &self,
        user: &str,
        role: &str,
        resource_instance: Option<&str>,
    ) -> Result<(), PermitError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    user: CheckUser<'a>,
    action: &'a str,
    resource: CheckResource<'a>,
}

#[derive(Debug, Serialize)]
struct CheckUser<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct CheckResource<'a> {
    #[serde(rename = "type")]
    resource_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    tenant: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    allow: bool,
}

#[derive(Debug, Serialize)]
struct LoginAsRequest<'a> {
    user_id: &'a str,
    tenant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginAsResponse {
    #[serde(alias = "element_bearer_token")]
    token: String,
}

#[derive(Debug, Serialize)]
struct RoleBinding<'a> {
    role: &'a str,
    tenant: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_instance: Option<&'a str>,
}

/// Bearer token that lets API calls act on behalf of one user
#[derive(Clone, PartialEq, Eq)]
pub struct ActAsToken(String);

impl ActAsToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ActAsToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActAsToken([REDACTED])")
    }
}

// ============================================================================
// Client
// ============================================================================

/// Permit API client
///
/// One client serves a single project environment and tenant. It is cheap to
/// clone and safe to share behind an `Arc`.
#[derive(Clone)]
pub struct PermitClient {
    http: reqwest::Client,
    config: PermitConfig,
}

impl std::fmt::Debug for PermitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermitClient")
            .field("config", &self.config)
            .finish()
    }
}

impl PermitClient {
    /// Create a client for the given config
    pub fn new(config: PermitConfig) -> Result<Self, PermitError> {
        if config.api_key.is_empty() {
            return Err(PermitError::Configuration("API key is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                PermitError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { http, config })
    }

    /// Create a client from environment variables (see [`PermitConfig::from_env`])
    pub fn from_env() -> Result<Self, PermitError> {
        Self::new(PermitConfig::from_env()?)
    }

    pub fn config(&self) -> &PermitConfig {
        &self.config
    }

    /// Get a handle to the access request API
    pub fn access_requests(&self) -> AccessRequests<'_> {
        AccessRequests::new(self)
    }

    /// Get a handle to the operation approval API
    pub fn operation_approvals(&self) -> OperationApprovals<'_> {
        OperationApprovals::new(self)
    }

    /// Ask the PDP whether `user` may perform `action` on `resource`
    pub async fn check(
        &self,
        user: &str,
        action: &str,
        resource: &str,
    ) -> Result<bool, PermitError> {
        let (resource_type, key) = match resource.split_once(':') {
            Some((t, k)) => (t, Some(k)),
            None => (resource, None),
        };

        let body = CheckRequest {
            user: CheckUser { key: user },
            action,
            resource: CheckResource {
                resource_type,
                key,
                tenant: &self.config.tenant,
            },
        };

        let url = endpoint(&self.config.pdp_url, &["allowed"])?;
        let response: CheckResponse = self
            .send_json("check", self.http.post(url).json(&body), self.service_auth()?)
            .await?;

        log::debug!(
            "check {} {} {} -> {}",
            user,
            action,
            resource,
            response.allow
        );
        Ok(response.allow)
    }

    /// Obtain a token that acts on behalf of `user` in the configured tenant
    ///
    /// Every call asks the API for a fresh token.
    pub async fn act_as(&self, user: &str) -> Result<ActAsToken, PermitError> {
        let url = endpoint(&self.config.api_url, &["v2", "auth", "elements_login_as"])?;
        let body = LoginAsRequest {
            user_id: user,
            tenant_id: &self.config.tenant,
        };

        let response: LoginAsResponse = self
            .send_json("act_as", self.http.post(url).json(&body), self.service_auth()?)
            .await?;
        Ok(ActAsToken(response.token))
    }

    /// Grant `role` to `user`, optionally scoped to a resource instance
    pub async fn assign_role(
        &self,
        user: &str,
        role: &str,
        resource_instance: Option<&str>,
    ) -> Result<(), PermitError> {
        let body = RoleBinding {
            role,
            tenant: &self.config.tenant,
            resource_instance,
        };
        let request = self.http.post(self.user_roles_url(user)?).json(&body);
        self.send("assign_role", request, self.service_auth()?).await?;
        log::info!("assigned role '{}' to '{}'", role, user);
        Ok(())
    }

    /// Revoke `role` from `user`, optionally scoped to a resource instance
    pub async fn unassign_role(
        &self,
        user: &str,
        role: &str,
        resource_instance: Option<&str>,
    ) -> Result<(), PermitError> {
        let body = RoleBinding {
            role,
            tenant: &self.config.tenant,
            resource_instance,
        };
        let request = self.http.delete(self.user_roles_url(user)?).json(&body);
        self.send("unassign_role", request, self.service_auth()?).await?;
        log::info!("unassigned role '{}' from '{}'", role, user);
        Ok(())
    }

    /// Fetch a user record by id or key
    pub async fn get_user(&self, user: &str) -> Result<Value, PermitError> {
        let url = self.facts_url(&["users", user])?;
        self.send_json("get_user", self.http.get(url), self.service_auth()?)
            .await
    }

    /// List instances of the configured resource type in the configured tenant
    pub async fn list_resource_instances(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Value, PermitError> {
        crate::approvals::validate_page(page, per_page)?;

        let url = self.facts_url(&["resource_instances"])?;
        let (page, per_page) = (page.to_string(), per_page.to_string());
        let request = self.http.get(url).query(&[
            ("tenant", self.config.tenant.as_str()),
            ("resource", self.config.resource_key.as_str()),
            ("page", page.as_str()),
            ("per_page", per_page.as_str()),
        ]);
        self.send_json("list_resource_instances", request, self.service_auth()?)
            .await
    }

    // ------------------------------------------------------------------------
    // Plumbing shared with the approvals handles
    // ------------------------------------------------------------------------

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `<api>/v2/facts/<project>/<env>/<segments..>`
    pub(crate) fn facts_url(&self, segments: &[&str]) -> Result<Url, PermitError> {
        self.project_url("facts", segments)
    }

    /// `<api>/v2/elements/<project>/<env>/<segments..>`
    pub(crate) fn elements_url(&self, segments: &[&str]) -> Result<Url, PermitError> {
        self.project_url("elements", segments)
    }

    fn project_url(&self, api: &str, segments: &[&str]) -> Result<Url, PermitError> {
        let prefix = [
            "v2",
            api,
            self.config.project_id.as_str(),
            self.config.env_id.as_str(),
        ];
        endpoint(&self.config.api_url, &[&prefix[..], segments].concat())
    }

    fn user_roles_url(&self, user: &str) -> Result<Url, PermitError> {
        self.facts_url(&["users", user, "roles"])
    }

    /// Headers authenticating with the static service key
    pub(crate) fn service_auth(&self) -> Result<HeaderMap, PermitError> {
        build_headers(&self.config.api_key)
    }

    /// Headers authenticating as the user behind `token`
    pub(crate) fn token_auth(&self, token: &ActAsToken) -> Result<HeaderMap, PermitError> {
        build_headers(token.as_str())
    }

    /// Send a request and return the raw body of a 2xx response
    pub(crate) async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        headers: HeaderMap,
    ) -> Result<String, PermitError> {
        let response = request
            .headers(headers)
            .send()
            .await
            .map_err(PermitError::from_reqwest_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(PermitError::from_reqwest_error)?;

        if !status.is_success() {
            log::warn!("{} failed with status {}", operation, status.as_u16());
            return Err(PermitError::PolicyRequestFailed {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    /// Send a request and keep whatever a 2xx response carried
    ///
    /// The body is JSON when it parses, otherwise the raw text. Used for
    /// writes, where the status alone says whether the change happened.
    pub(crate) async fn send_value(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        headers: HeaderMap,
    ) -> Result<Value, PermitError> {
        let body = self.send(operation, request, headers).await?;
        Ok(match serde_json::from_str::<Value>(&body) {
            Ok(value) => value,
            Err(_) if body.trim().is_empty() => Value::Null,
            Err(_) => {
                log::debug!("{} returned a non-JSON body", operation);
                Value::String(body)
            }
        })
    }

    /// Send a request and parse the JSON body of a 2xx response
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        headers: HeaderMap,
    ) -> Result<T, PermitError> {
        let body = self.send(operation, request, headers).await?;
        let body = if body.trim().is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(|e| {
            PermitError::InvalidResponse(format!("Failed to parse {} response: {}", operation, e))
        })
    }
}

#[async_trait]
impl PolicyDecisionPoint for PermitClient {
    async fn check(&self, user: &str, action: &str, resource: &str) -> Result<bool, PermitError> {
        PermitClient::check(self, user, action, resource).await
    }

    async fn unassign_role(
        &self,
        user: &str,
        role: &str,
        resource_instance: Option<&str>,
    ) -> Result<(), PermitError> {
        PermitClient::unassign_role(self, user, role, resource_instance).await
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Append `segments` to `base`, percent-encoding each one
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, PermitError> {
    let mut url = Url::parse(base)
        .map_err(|e| PermitError::Configuration(format!("Invalid URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| PermitError::Configuration(format!("URL '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn build_headers(bearer: &str) -> Result<HeaderMap, PermitError> {
    let mut headers = HeaderMap::new();

    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|e| PermitError::Configuration(format!("Invalid API key: {}", e)))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PermitClient {
        let config = PermitConfig::new("test-key", "proj", "env")
            .with_api_url(server.uri())
            .with_pdp_url(server.uri())
            .with_tenant("kitchen")
            .with_resource_key("restaurants");
        PermitClient::new(config).unwrap()
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = PermitClient::new(PermitConfig::new("", "p", "e")).unwrap_err();
        assert!(matches!(err, PermitError::Configuration(_)));
    }

    #[test]
    fn test_client_debug_redacts_api_key() {
        let client = PermitClient::new(PermitConfig::new("permit_key_secret", "p", "e")).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("permit_key_secret"));
    }

    #[tokio::test]
    async fn test_check_sends_user_action_resource() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/allowed"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(json!({
                "user": {"key": "henry"},
                "action": "read",
                "resource": {"type": "restaurants", "key": "3", "tenant": "kitchen"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"allow": true})))
            .expect(1)
            .mount(&server)
            .await;

        let allowed = client_for(&server)
            .check("henry", "read", "restaurants:3")
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn test_check_denied() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/allowed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"allow": false})))
            .mount(&server)
            .await;

        let allowed = client_for(&server)
            .check("henry", "operate", "restaurants")
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_check_error_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/allowed"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .check("henry", "read", "restaurants:1")
            .await
            .unwrap_err();

        match err {
            PermitError::PolicyRequestFailed {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, "check");
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_act_as_returns_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/auth/elements_login_as"))
            .and(body_json(json!({"user_id": "henry", "tenant_id": "kitchen"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-henry"})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.act_as("henry").await.unwrap();
        let second = client.act_as("henry").await.unwrap();

        assert_eq!(first.as_str(), "tok-henry");
        assert_eq!(first, second);
        assert_eq!(format!("{:?}", first), "ActAsToken([REDACTED])");
    }

    #[tokio::test]
    async fn test_unassign_role_scoped_to_instance() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/v2/facts/proj/env/users/henry/roles"))
            .and(body_json(json!({
                "role": "_Approved_",
                "tenant": "kitchen",
                "resource_instance": "restaurants:3"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .unassign_role("henry", "_Approved_", Some("restaurants:3"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_assign_role_without_instance() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/facts/proj/env/users/rose/roles"))
            .and(body_json(json!({"role": "viewer", "tenant": "kitchen"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .assign_role("rose", "viewer", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_resource_instances_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/facts/proj/env/resource_instances"))
            .and(query_param("tenant", "kitchen"))
            .and(query_param("resource", "restaurants"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"key": "1", "id": "abc"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let instances = client_for(&server)
            .list_resource_instances(1, DEFAULT_INSTANCES_PER_PAGE)
            .await
            .unwrap();
        assert_eq!(instances[0]["key"], "1");
    }

    #[tokio::test]
    async fn test_list_resource_instances_rejects_bad_page_locally() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .list_resource_instances(0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, PermitError::InvalidRequest(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint("http://pdp.local/", &["users", "a/b?c#d", "roles"]).unwrap();
        assert_eq!(url.as_str(), "http://pdp.local/users/a%2Fb%3Fc%23d/roles");

        let url = endpoint("https://api.permit.io/base", &["v2", "auth"]).unwrap();
        assert_eq!(url.path(), "/base/v2/auth");

        assert!(matches!(
            endpoint("not a url", &["x"]),
            Err(PermitError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_user_id_cannot_escape_its_path_segment() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/facts/proj/env/users/ann%2F..%2Froles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "ann/../roles"})))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server).get_user("ann/../roles").await.unwrap();
        assert_eq!(user["key"], "ann/../roles");
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/facts/proj/env/users/joe"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_user("joe").await.unwrap_err();
        assert!(matches!(err, PermitError::InvalidResponse(_)));
    }
}
