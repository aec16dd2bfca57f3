//! Food-ordering tools gated by policy checks.
//!
//! Every restaurant is a resource instance `restaurants:<id>`. Viewing and
//! ordering need `read` on it. Users with the child role may only order
//! dishes up to [`CHILD_ALLOWANCE_CENTS`] unless they also hold `operate`,
//! which an approved operation approval grants exactly once.
//!
//! # Available Tools
//!
//! | Tool | Description |
//! |------|-------------|
//! | [`ListDishesTool`] | List a restaurant's dishes with prices |
//! | [`OrderDishTool`] | Order a dish, enforcing the child allowance |
//!
//! The menu itself sits behind the [`Menu`] trait; [`InMemoryMenu`] holds
//! the demo data.

mod list_dishes;
mod order_dish;

pub use list_dishes::ListDishesTool;
pub use order_dish::OrderDishTool;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tollgate_core::tool::{box_tool, DynTool};
use tollgate_core::{ToolError, CHILD_ROLE, PARENT_ROLE};
use tollgate_permit::PolicyDecisionPoint;

/// Resource type restaurants are registered under
pub const RESOURCE_TYPE: &str = "restaurants";

/// Role an approved operation approval binds on the restaurant
pub const APPROVED_ROLE: &str = "_Approved_";

/// Most a child may spend on one dish without an approval
pub const CHILD_ALLOWANCE_CENTS: u64 = 1000;

/// Returns the ordering tools
pub fn all_tools(
    menu: Arc<dyn Menu>,
    pdp: Arc<dyn PolicyDecisionPoint>,
) -> Vec<Box<dyn DynTool>> {
    vec![
        box_tool(ListDishesTool::new(menu.clone(), pdp.clone())),
        box_tool(OrderDishTool::new(menu, pdp)),
    ]
}

/// The `restaurants:<id>` resource string for a restaurant
pub fn restaurant_resource(restaurant_id: &str) -> String {
    format!("{}:{}", RESOURCE_TYPE, restaurant_id)
}

/// Format cents as dollars, e.g. `10.99`
pub fn dollars(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("Menu backend error: {0}")]
    Backend(String),
}

impl From<MenuError> for ToolError {
    fn from(err: MenuError) -> Self {
        ToolError::Custom(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
    pub price_cents: u64,
}

impl Dish {
    pub fn new(name: impl Into<String>, price_cents: u64) -> Self {
        Self {
            name: name.into(),
            price_cents,
        }
    }

    pub fn price(&self) -> f64 {
        self.price_cents as f64 / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub user_id: String,
    pub restaurant_id: String,
    pub dish: Dish,
}

/// Read access to restaurants, dishes and users, plus order intake
#[async_trait]
pub trait Menu: Send + Sync {
    /// Dishes served by a restaurant, empty for unknown restaurants
    async fn dishes(&self, restaurant_id: &str) -> Result<Vec<Dish>, MenuError>;

    /// A dish by exact name within one restaurant
    async fn find_dish(
        &self,
        restaurant_id: &str,
        dish_name: &str,
    ) -> Result<Option<Dish>, MenuError> {
        Ok(self
            .dishes(restaurant_id)
            .await?
            .into_iter()
            .find(|d| d.name == dish_name))
    }

    /// A user by id or username
    async fn user(&self, user_id: &str) -> Result<Option<User>, MenuError>;

    async fn place_order(&self, order: Order) -> Result<(), MenuError>;
}

struct Restaurant {
    id: String,
    name: String,
    dishes: Vec<Dish>,
}

/// A menu held in memory
#[derive(Default)]
pub struct InMemoryMenu {
    restaurants: Vec<Restaurant>,
    users: Vec<User>,
    orders: RwLock<Vec<Order>>,
}

impl InMemoryMenu {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four demo restaurants and the joe / jane / henry / rose family
    pub fn seeded() -> Self {
        Self::new()
            .with_user("1", "joe", PARENT_ROLE)
            .with_user("2", "jane", PARENT_ROLE)
            .with_user("3", "henry", CHILD_ROLE)
            .with_user("4", "rose", CHILD_ROLE)
            .with_restaurant(
                "1",
                "Pizza Palace",
                vec![
                    Dish::new("Cheese Pizza", 899),
                    Dish::new("Pepperoni Pizza", 1099),
                    Dish::new("Veggie Pizza", 949),
                ],
            )
            .with_restaurant(
                "2",
                "Burger Bonanza",
                vec![
                    Dish::new("Classic Burger", 799),
                    Dish::new("Deluxe Burger", 1299),
                    Dish::new("Fries", 349),
                ],
            )
            .with_restaurant(
                "3",
                "Fancy French",
                vec![
                    Dish::new("Escargot", 1599),
                    Dish::new("Foie Gras", 1999),
                    Dish::new("Truffle Pasta", 1849),
                ],
            )
            .with_restaurant(
                "4",
                "Sushi World",
                vec![
                    Dish::new("California Roll", 699),
                    Dish::new("Sushi Platter", 2299),
                    Dish::new("Tempura", 999),
                ],
            )
    }

    pub fn with_user(
        mut self,
        id: impl Into<String>,
        username: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        self.users.push(User {
            id: id.into(),
            username: username.into(),
            role: role.into(),
        });
        self
    }

    pub fn with_restaurant(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        dishes: Vec<Dish>,
    ) -> Self {
        self.restaurants.push(Restaurant {
            id: id.into(),
            name: name.into(),
            dishes,
        });
        self
    }

    /// Name of a restaurant by id
    pub fn restaurant_name(&self, restaurant_id: &str) -> Option<&str> {
        self.restaurants
            .iter()
            .find(|r| r.id == restaurant_id)
            .map(|r| r.name.as_str())
    }

    /// Orders placed so far, oldest first
    pub fn orders(&self) -> Vec<Order> {
        self.orders.read().clone()
    }
}

#[async_trait]
impl Menu for InMemoryMenu {
    async fn dishes(&self, restaurant_id: &str) -> Result<Vec<Dish>, MenuError> {
        Ok(self
            .restaurants
            .iter()
            .find(|r| r.id == restaurant_id)
            .map(|r| r.dishes.clone())
            .unwrap_or_default())
    }

    async fn user(&self, user_id: &str) -> Result<Option<User>, MenuError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.id == user_id || u.username == user_id)
            .cloned())
    }

    async fn place_order(&self, order: Order) -> Result<(), MenuError> {
        log::info!(
            "order placed: '{}' from restaurant {} for user {}",
            order.dish.name,
            order.restaurant_id,
            order.user_id
        );
        self.orders.write().push(order);
        Ok(())
    }
}
