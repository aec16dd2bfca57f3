use std::sync::Arc;

use tollgate_permit::PolicyDecisionPoint;

use crate::approvals::api_error;
use crate::ordering::{restaurant_resource, Menu};
use crate::prelude::*;

/// Input for listing a restaurant's dishes
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDishesInput {
    /// The ID of the user
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// The key of the restaurant
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub restaurant_id: String,
}

/// Tool for listing dishes and prices, for users allowed to see the restaurant
pub struct ListDishesTool {
    menu: Arc<dyn Menu>,
    pdp: Arc<dyn PolicyDecisionPoint>,
}

impl ListDishesTool {
    pub fn new(menu: Arc<dyn Menu>, pdp: Arc<dyn PolicyDecisionPoint>) -> Self {
        Self { menu, pdp }
    }
}

impl Tool for ListDishesTool {
    type Input = ListDishesInput;

    fn name(&self) -> &str {
        "list_dishes"
    }

    fn description(&self) -> &str {
        "Lists the dishes available at a given restaurant along with their prices in dollars. Dishes are only listed when the user has access; otherwise an access request will need to be sent."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        let resource = restaurant_resource(&input.restaurant_id);
        let permitted = self
            .pdp
            .check(&input.user_id, "read", &resource)
            .await
            .map_err(api_error)?;

        if !permitted {
            return Err(
                "Access denied. You are not permitted to view dishes from this restaurant.".into(),
            );
        }

        let dishes: Vec<(String, f64)> = self
            .menu
            .dishes(&input.restaurant_id)
            .await?
            .into_iter()
            .map(|d| {
                let price = d.price();
                (d.name, price)
            })
            .collect();

        Ok(ToolResult::json(dishes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::test_support::FakePdp;
    use crate::ordering::InMemoryMenu;
    use serde_json::json;

    fn tool(pdp: FakePdp) -> ListDishesTool {
        ListDishesTool::new(Arc::new(InMemoryMenu::seeded()), Arc::new(pdp))
    }

    #[test]
    fn test_tool_metadata() {
        let tool = tool(FakePdp::default());
        assert_eq!(tool.name(), "list_dishes");
        assert!(tool.description().contains("prices"));
    }

    #[tokio::test]
    async fn test_list_dishes_as_name_price_pairs() {
        let tool = tool(FakePdp::default().allow("henry", "read", "restaurants:1"));
        let input = serde_json::from_value(json!({"user_id": "henry", "restaurant_id": 1})).unwrap();

        let result = tool.execute(input).await.unwrap();
        assert_eq!(
            result,
            ToolResult::Json(json!([
                ["Cheese Pizza", 8.99],
                ["Pepperoni Pizza", 10.99],
                ["Veggie Pizza", 9.49]
            ]))
        );
    }

    #[tokio::test]
    async fn test_list_dishes_denied() {
        let tool = tool(FakePdp::default().allow("henry", "read", "restaurants:1"));
        let input =
            serde_json::from_value(json!({"user_id": "henry", "restaurant_id": "3"})).unwrap();

        let err = tool.execute(input).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access denied. You are not permitted to view dishes from this restaurant."
        );
    }
}
