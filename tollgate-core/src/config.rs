//! Tool exposure configuration
//!
//! The config file is JSON. Environment variables may be referenced as
//! `${VAR}` or `${VAR:-default}` anywhere in the file:
//!
//! ```json
//! {
//!   "excluded_tools": ["${HIDDEN_TOOL:-deny_operation_approval}"],
//!   "roles": {
//!     "unrestricted": ["parent"],
//!     "allow_lists": { "child": ["list_dishes", "order_dish"] }
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ToolRegistry;
use crate::role::RoleFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which tools are exposed, and to whom
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Tools registered for in-process use but never shown to the agent
    #[serde(default)]
    pub excluded_tools: Vec<String>,

    #[serde(default)]
    pub roles: RoleFilter,
}

impl TollgateConfig {
    pub fn with_excluded_tool(mut self, name: impl Into<String>) -> Self {
        self.excluded_tools.push(name.into());
        self
    }

    pub fn with_roles(mut self, roles: RoleFilter) -> Self {
        self.roles = roles;
        self
    }

    /// An empty registry honoring this config's exclusion list
    pub fn registry(&self) -> ToolRegistry {
        ToolRegistry::with_exclusions(self.excluded_tools.iter().cloned())
    }

    /// Parse a config from JSON text after expanding environment variables
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(&expand_env_vars(content))?)
    }
}

/// Load a config file; `~` in the path is expanded
pub async fn load_config_file(path: impl AsRef<Path>) -> Result<TollgateConfig, ConfigError> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let expanded_path = shellexpand::tilde(&path_str);
    let path = Path::new(expanded_path.as_ref());

    let content = tokio::fs::read_to_string(path).await?;
    let config = TollgateConfig::from_json(&content)?;

    log::debug!(
        "loaded config from {} ({} excluded tools)",
        path.display(),
        config.excluded_tools.len()
    );
    Ok(config)
}

/// Expand environment variables in a string
///
/// Supports:
/// - `${VAR}` - expands to the value of VAR, or empty string if not set
/// - `${VAR:-default}` - expands to the value of VAR, or "default" if not set
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next(); // '{'

        let mut var_name = String::new();
        let mut default_value = None;

        while let Some(next_ch) = chars.next() {
            match next_ch {
                '}' => break,
                ':' if chars.peek() == Some(&'-') => {
                    chars.next(); // '-'
                    let mut value = String::new();
                    for default_ch in chars.by_ref() {
                        if default_ch == '}' {
                            break;
                        }
                        value.push(default_ch);
                    }
                    default_value = Some(value);
                    break;
                }
                _ => var_name.push(next_ch),
            }
        }

        match std::env::var(&var_name) {
            Ok(value) => result.push_str(&value),
            Err(_) => result.push_str(default_value.as_deref().unwrap_or_default()),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{CHILD_ROLE, PARENT_ROLE};
    use std::io::Write;

    #[test]
    fn test_expand_plain_text_untouched() {
        assert_eq!(expand_env_vars("no vars here $ {x}"), "no vars here $ {x}");
    }

    #[test]
    fn test_expand_with_default() {
        assert_eq!(
            expand_env_vars("${TOLLGATE_SURELY_UNSET_VAR:-fallback}"),
            "fallback"
        );
        assert_eq!(expand_env_vars("a${TOLLGATE_SURELY_UNSET_VAR}b"), "ab");
    }

    #[test]
    fn test_expand_reads_environment() {
        // PATH is present in every test environment
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_vars("${PATH:-nope}"), path);
    }

    #[test]
    fn test_default_config_uses_default_roles() {
        let config = TollgateConfig::from_json("{}").unwrap();
        assert!(config.excluded_tools.is_empty());
        assert!(config.roles.permits(PARENT_ROLE, "deny_access_request"));
        assert!(config.roles.permits(CHILD_ROLE, "order_dish"));
    }

    #[test]
    fn test_registry_honors_exclusions() {
        let config = TollgateConfig::default().with_excluded_tool("list_dishes");
        let registry = config.registry();
        assert!(registry.is_empty());
        assert!(!registry.is_exposed("list_dishes"));
    }

    #[tokio::test]
    async fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "excluded_tools": ["${{TOLLGATE_SURELY_UNSET_VAR:-deny_operation_approval}}"],
                "roles": {{"allow_lists": {{"viewer": ["list_dishes"]}}}}
            }}"#
        )
        .unwrap();

        let config = load_config_file(file.path()).await.unwrap();
        assert_eq!(config.excluded_tools, vec!["deny_operation_approval"]);
        assert!(config.roles.permits("viewer", "list_dishes"));
        assert!(!config.roles.is_known(PARENT_ROLE));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_config_file("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_json() {
        let err = TollgateConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
