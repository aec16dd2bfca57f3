//! Connection settings for the PDP and the approvals API

use std::time::Duration;

use crate::error::PermitError;

/// Default policy decision point
pub const DEFAULT_PDP_URL: &str = "https://cloudpdp.api.permit.io";

/// Default approvals / facts API
pub const DEFAULT_API_URL: &str = "https://api.permit.io";

/// Default tenant
pub const DEFAULT_TENANT: &str = "default";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to address one Permit project environment
#[derive(Clone)]
pub struct PermitConfig {
    pub pdp_url: String,
    pub api_url: String,
    pub api_key: String,
    pub project_id: String,
    pub env_id: String,
    pub tenant: String,
    /// Element config used for access requests
    pub access_elements_config_id: String,
    /// Element config used for operation approvals
    pub operation_elements_config_id: String,
    /// Resource type the approval workflow is about (e.g. "restaurants")
    pub resource_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for PermitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermitConfig")
            .field("pdp_url", &self.pdp_url)
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("env_id", &self.env_id)
            .field("tenant", &self.tenant)
            .field("access_elements_config_id", &self.access_elements_config_id)
            .field(
                "operation_elements_config_id",
                &self.operation_elements_config_id,
            )
            .field("resource_key", &self.resource_key)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PermitConfig {
    /// Create a config with default URLs and tenant
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        env_id: impl Into<String>,
    ) -> Self {
        Self {
            pdp_url: DEFAULT_PDP_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            project_id: project_id.into(),
            env_id: env_id.into(),
            tenant: DEFAULT_TENANT.to_string(),
            access_elements_config_id: String::new(),
            operation_elements_config_id: String::new(),
            resource_key: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read the config from the process environment
    ///
    /// `PERMIT_API_KEY`, `PROJECT_ID`, `ENV_ID`, `ACCESS_ELEMENTS_CONFIG_ID`,
    /// `OPERATION_ELEMENTS_CONFIG_ID` and `RESOURCE_KEY` are required;
    /// `PERMIT_PDP_URL`, `PERMIT_API_URL` and `TENANT` fall back to defaults.
    pub fn from_env() -> Result<Self, PermitError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PermitError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    PermitError::Configuration(format!("{} environment variable not set", key))
                })
        };
        let optional = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            pdp_url: optional("PERMIT_PDP_URL", DEFAULT_PDP_URL),
            api_url: optional("PERMIT_API_URL", DEFAULT_API_URL),
            api_key: required("PERMIT_API_KEY")?,
            project_id: required("PROJECT_ID")?,
            env_id: required("ENV_ID")?,
            tenant: optional("TENANT", DEFAULT_TENANT),
            access_elements_config_id: required("ACCESS_ELEMENTS_CONFIG_ID")?,
            operation_elements_config_id: required("OPERATION_ELEMENTS_CONFIG_ID")?,
            resource_key: required("RESOURCE_KEY")?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_pdp_url(mut self, url: impl Into<String>) -> Self {
        self.pdp_url = url.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn with_access_elements_config(mut self, id: impl Into<String>) -> Self {
        self.access_elements_config_id = id.into();
        self
    }

    pub fn with_operation_elements_config(mut self, id: impl Into<String>) -> Self {
        self.operation_elements_config_id = id.into();
        self
    }

    pub fn with_resource_key(mut self, key: impl Into<String>) -> Self {
        self.resource_key = key.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
