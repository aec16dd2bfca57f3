//! Ready-made tools for the tollgate tool layer
//!
//! - [`approvals`]: the access request / operation approval CRUD surface and
//!   the resource-instance lister, backed by [`tollgate_permit::PermitClient`]
//! - [`ordering`]: the food-ordering business tools, gated by PDP checks
//!
//! [`toolbox`] wires both groups into a [`ToolRegistry`] honouring the
//! configured exclusion list.

pub mod approvals;
pub mod ordering;

use std::sync::Arc;

use tollgate_core::{RegistryError, TollgateConfig, ToolRegistry};
use tollgate_permit::PermitClient;

pub use approvals::all_tools as all_approval_tools;
pub use ordering::{all_tools as all_ordering_tools, InMemoryMenu, Menu};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use schemars::JsonSchema;
    pub use serde::{Deserialize, Serialize};
    pub use tollgate_core::{Tool, ToolError, ToolResult};
}

/// Build the registry for a deployment
///
/// The approval tools come first, then the ordering tools. Names listed in
/// `config.excluded_tools` stay registered but hidden from the agent.
pub fn toolbox(
    config: &TollgateConfig,
    client: Arc<PermitClient>,
    menu: Arc<dyn Menu>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = config.registry();

    for tool in approvals::all_tools(client.clone()) {
        registry.register_boxed(tool)?;
    }
    for tool in ordering::all_tools(menu, client) {
        registry.register_boxed(tool)?;
    }

    log::info!(
        "toolbox ready: {} tools, {} exposed",
        registry.len(),
        registry.definitions().len()
    );
    Ok(registry)
}

/// Accept a JSON string or number where a string id is expected
///
/// Models regularly send `"restaurant_id": 3` for a string parameter.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Deserialize};

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Ids {
        #[serde(deserialize_with = "deserialize_id")]
        id: String,
    }

    #[test]
    fn test_deserialize_id_accepts_numbers() {
        let ids: Ids = serde_json::from_value(json!({"id": 3})).unwrap();
        assert_eq!(ids.id, "3");

        let ids: Ids = serde_json::from_value(json!({"id": "henry"})).unwrap();
        assert_eq!(ids.id, "henry");

        assert!(serde_json::from_value::<Ids>(json!({"id": [1]})).is_err());
    }

    #[test]
    fn test_toolbox_registers_everything() {
        let config = tollgate_permit::PermitConfig::new("key", "proj", "env")
            .with_resource_key("restaurants");
        let client = Arc::new(PermitClient::new(config).unwrap());
        let menu: Arc<dyn Menu> = Arc::new(InMemoryMenu::seeded());

        let settings = TollgateConfig::default().with_excluded_tool("create_access_request");
        let registry = toolbox(&settings, client, menu).unwrap();

        assert_eq!(registry.len(), 11);
        assert!(!registry.is_exposed("create_access_request"));
        assert!(registry.handler("create_access_request").is_some());

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names.first().map(String::as_str), Some("list_resource_instances"));
        assert_eq!(names.last().map(String::as_str), Some("order_dish"));
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn test_every_tool_schema_translates() {
        let config = tollgate_permit::PermitConfig::new("key", "proj", "env");
        let client = Arc::new(PermitClient::new(config).unwrap());
        let menu: Arc<dyn Menu> = Arc::new(InMemoryMenu::seeded());

        let registry = toolbox(&TollgateConfig::default(), client, menu).unwrap();
        let declarations = registry.declarations().unwrap();

        for declaration in &declarations {
            let schema = serde_json::to_string(&declaration.parameters).unwrap();
            assert!(!schema.contains("anyOf"), "{}: {}", declaration.name, schema);
            assert!(!schema.contains("\"default\""), "{}: {}", declaration.name, schema);
        }
    }
}
