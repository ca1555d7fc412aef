//! Order-creation wizard
//!
//! A forward-moving step machine: select a restaurant, build a cart
//! from its menu, review with a delivery address, confirm. Each step
//! transition is guarded locally (empty carts and missing addresses
//! never reach the server) and a failed submission keeps the user on
//! Review with everything they entered intact.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, ApiError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CartLine {
    pub item: MenuItem,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.item.price * self.quantity as f64
    }
}

/// The cart keyed by menu item id. Invariant: every line has
/// quantity >= 1; a decrement to zero removes the line.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: BTreeMap<i64, CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one of `item`: bumps the quantity of an existing line, or
    /// inserts a new line at quantity 1.
    pub fn add(&mut self, item: MenuItem) {
        self.lines
            .entry(item.id)
            .and_modify(|line| line.quantity += 1)
            .or_insert(CartLine { item, quantity: 1 });
    }

    /// Remove one of the item. A line at quantity 1 is deleted; removing
    /// an item with no line is a no-op.
    pub fn remove(&mut self, item_id: i64) {
        if let Some(line) = self.lines.get_mut(&item_id) {
            if line.quantity <= 1 {
                self.lines.remove(&item_id);
            } else {
                line.quantity -= 1;
            }
        }
    }

    /// Recomputed from the lines on every call, never cached.
    pub fn total(&self) -> f64 {
        self.lines.values().map(CartLine::line_total).sum()
    }

    pub fn quantity_of(&self, item_id: i64) -> u32 {
        self.lines.get(&item_id).map_or(0, |line| line.quantity)
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    SelectRestaurant,
    ChooseItems,
    Review,
    Confirmed,
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("delivery address is required")]
    MissingAddress,

    #[error("unknown restaurant {0}")]
    UnknownRestaurant(i64),

    #[error("item {0} is not on the menu")]
    UnknownMenuItem(i64),

    #[error("not available in the {0:?} step")]
    InvalidStep(WizardStep),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Serialize)]
struct CreateOrderItem {
    menu_item_id: i64,
    quantity: u32,
    price: f64,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    restaurant_id: i64,
    items: Vec<CreateOrderItem>,
    delivery_address: String,
    special_instructions: String,
}

/// Acknowledgement from `POST /orders/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedOrder {
    #[serde(default, alias = "order_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

pub struct OrderWizard {
    api: Arc<ApiClient>,
    step: WizardStep,
    restaurants: Vec<Restaurant>,
    selected: Option<Restaurant>,
    menu: Vec<MenuItem>,
    cart: Cart,
    delivery_address: String,
    special_instructions: String,
    confirmed: Option<CreatedOrder>,
}

impl OrderWizard {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            step: WizardStep::SelectRestaurant,
            restaurants: Vec::new(),
            selected: None,
            menu: Vec::new(),
            cart: Cart::new(),
            delivery_address: String::new(),
            special_instructions: String::new(),
            confirmed: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    pub fn selected_restaurant(&self) -> Option<&Restaurant> {
        self.selected.as_ref()
    }

    pub fn menu(&self) -> &[MenuItem] {
        &self.menu
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_total(&self) -> f64 {
        self.cart.total()
    }

    pub fn delivery_address(&self) -> &str {
        &self.delivery_address
    }

    pub fn special_instructions(&self) -> &str {
        &self.special_instructions
    }

    /// The acknowledgement from the last confirmed submission, if any.
    pub fn confirmed_order(&self) -> Option<&CreatedOrder> {
        self.confirmed.as_ref()
    }

    /// Fetch the restaurant list for the selection step.
    pub async fn load_restaurants(&mut self) -> Result<&[Restaurant], WizardError> {
        if self.step != WizardStep::SelectRestaurant {
            return Err(WizardError::InvalidStep(self.step));
        }
        self.restaurants = self.api.get("/restaurants/").await?;
        tracing::debug!(count = self.restaurants.len(), "loaded restaurants");
        Ok(&self.restaurants)
    }

    /// Pick a restaurant and load its menu, moving to ChooseItems.
    pub async fn select_restaurant(&mut self, restaurant_id: i64) -> Result<(), WizardError> {
        if self.step != WizardStep::SelectRestaurant {
            return Err(WizardError::InvalidStep(self.step));
        }
        let restaurant = self
            .restaurants
            .iter()
            .find(|r| r.id == restaurant_id)
            .cloned()
            .ok_or(WizardError::UnknownRestaurant(restaurant_id))?;

        self.menu = self
            .api
            .get(&format!("/restaurants/{restaurant_id}/menu"))
            .await?;
        tracing::info!(restaurant = %restaurant.name, items = self.menu.len(), "menu loaded");
        self.selected = Some(restaurant);
        self.step = WizardStep::ChooseItems;
        Ok(())
    }

    pub fn add_to_cart(&mut self, item_id: i64) -> Result<(), WizardError> {
        if self.step != WizardStep::ChooseItems {
            return Err(WizardError::InvalidStep(self.step));
        }
        let item = self
            .menu
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or(WizardError::UnknownMenuItem(item_id))?;
        self.cart.add(item);
        Ok(())
    }

    pub fn remove_from_cart(&mut self, item_id: i64) -> Result<(), WizardError> {
        if self.step != WizardStep::ChooseItems {
            return Err(WizardError::InvalidStep(self.step));
        }
        self.cart.remove(item_id);
        Ok(())
    }

    /// Advance to Review. Guarded: never enters Review with an empty cart.
    pub fn proceed_to_review(&mut self) -> Result<(), WizardError> {
        if self.step != WizardStep::ChooseItems {
            return Err(WizardError::InvalidStep(self.step));
        }
        if self.cart.is_empty() {
            return Err(WizardError::EmptyCart);
        }
        self.step = WizardStep::Review;
        Ok(())
    }

    pub fn set_delivery_address(&mut self, address: impl Into<String>) {
        self.delivery_address = address.into();
    }

    pub fn set_special_instructions(&mut self, instructions: impl Into<String>) {
        self.special_instructions = instructions.into();
    }

    /// Submit the order. Guarded on a non-empty delivery address; a
    /// failed request leaves the wizard on Review with the cart, address
    /// and instructions untouched.
    pub async fn submit(&mut self) -> Result<CreatedOrder, WizardError> {
        if self.step != WizardStep::Review {
            return Err(WizardError::InvalidStep(self.step));
        }
        if self.delivery_address.trim().is_empty() {
            return Err(WizardError::MissingAddress);
        }
        let restaurant = self
            .selected
            .as_ref()
            .expect("restaurant selected before Review");

        let request = CreateOrderRequest {
            restaurant_id: restaurant.id,
            items: self
                .cart
                .lines()
                .map(|line| CreateOrderItem {
                    menu_item_id: line.item.id,
                    quantity: line.quantity,
                    price: line.item.price,
                })
                .collect(),
            delivery_address: self.delivery_address.clone(),
            special_instructions: self.special_instructions.clone(),
        };

        let created: CreatedOrder = self.api.post("/orders/create", &request).await?;
        tracing::info!(order_id = ?created.id, "order placed");

        self.step = WizardStep::Confirmed;
        self.cart.clear();
        self.delivery_address.clear();
        self.special_instructions.clear();
        self.confirmed = Some(created.clone());
        Ok(created)
    }

    /// Back to the start for another order. The restaurant list is kept,
    /// everything entered for the previous order is dropped.
    pub fn reset(&mut self) {
        self.step = WizardStep::SelectRestaurant;
        self.selected = None;
        self.menu.clear();
        self.cart.clear();
        self.delivery_address.clear();
        self.special_instructions.clear();
        self.confirmed = None;
    }
}
