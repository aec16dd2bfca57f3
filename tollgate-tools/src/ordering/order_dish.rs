use std::sync::Arc;

use tollgate_core::CHILD_ROLE;
use tollgate_permit::PolicyDecisionPoint;

use crate::approvals::api_error;
use crate::ordering::{
    dollars, restaurant_resource, Menu, Order, APPROVED_ROLE, CHILD_ALLOWANCE_CENTS,
};
use crate::prelude::*;

/// Input for ordering a dish
#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderDishInput {
    /// The ID of the person ordering
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub user_id: String,

    /// The key of the restaurant
    #[serde(deserialize_with = "crate::deserialize_id")]
    pub restaurant_id: String,

    /// The name of the dish to order
    pub dish_name: String,
}

/// Tool for placing an order
pub struct OrderDishTool {
    menu: Arc<dyn Menu>,
    pdp: Arc<dyn PolicyDecisionPoint>,
}

impl OrderDishTool {
    pub fn new(menu: Arc<dyn Menu>, pdp: Arc<dyn PolicyDecisionPoint>) -> Self {
        Self { menu, pdp }
    }
}

impl Tool for OrderDishTool {
    type Input = OrderDishInput;

    fn name(&self) -> &str {
        "order_dish"
    }

    fn description(&self) -> &str {
        "Processes an order for a dish. Children need an approved operation approval to order dishes above the allowance."
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
        let dish = self
            .menu
            .find_dish(&input.restaurant_id, &input.dish_name)
            .await?
            .ok_or_else(|| ToolError::from(format!("Dish '{}' not found.", input.dish_name)))?;

        let user = self.menu.user(&input.user_id).await?.ok_or_else(|| {
            ToolError::from(format!(
                "User with ID '{}' not found. Please check the user ID.",
                input.user_id
            ))
        })?;

        let resource = restaurant_resource(&input.restaurant_id);
        let readable = self
            .pdp
            .check(&input.user_id, "read", &resource)
            .await
            .map_err(api_error)?;
        if !readable {
            return Err(
                "Access denied. You are not permitted to order from this restaurant.".into(),
            );
        }

        let operate = self
            .pdp
            .check(&input.user_id, "operate", &resource)
            .await
            .map_err(api_error)?;

        if user.role == CHILD_ROLE && dish.price_cents > CHILD_ALLOWANCE_CENTS && !operate {
            return Err(format!(
                "This dish costs ${}, and you can only order dishes less than ${}. To order this dish, you need to request an approval.",
                dollars(dish.price_cents),
                dollars(CHILD_ALLOWANCE_CENTS)
            )
            .into());
        }

        // Spend the grant before the order is recorded
        if operate {
            self.pdp
                .unassign_role(&input.user_id, APPROVED_ROLE, Some(&resource))
                .await
                .map_err(api_error)?;
            log::info!("consumed one-time approval of '{}' on {}", input.user_id, resource);
        }

        self.menu
            .place_order(Order {
                user_id: user.id,
                restaurant_id: input.restaurant_id,
                dish: dish.clone(),
            })
            .await?;

        Ok(format!("Order successfully placed for {}!", dish.name).into())
    }
}
