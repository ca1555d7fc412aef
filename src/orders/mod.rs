//! Order snapshots and the stateless lookup path
//!
//! An [`OrderDetails`] is an immutable snapshot of one order as the
//! server reports it; it is replaced wholesale on every fetch and never
//! patched field-by-field. [`OrderLookup`] holds no state beyond the
//! client handle and caches nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, ApiError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub delivery_person: String,
    pub estimated_time: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub status: String,
    pub method: String,
    pub amount: f64,
}

/// Full order snapshot from `GET /orders/{id}/details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_id: i64,
    pub customer_name: String,
    pub order_time: DateTime<Utc>,
    pub status: String,
    pub delivery_address: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub delivery: Option<DeliveryInfo>,
    #[serde(default)]
    pub payment: Option<PaymentInfo>,
    pub total_amount: f64,
    pub delivery_charge: f64,
    pub tax: f64,
    pub final_amount: f64,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("order {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Api(ApiError),
}

/// Stateless read path for existing orders.
pub struct OrderLookup {
    api: Arc<ApiClient>,
}

impl OrderLookup {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Fetch a fresh snapshot of the order. A 404 from the server is the
    /// terminal [`LookupError::NotFound`]; transient failures surface as
    /// [`LookupError::Api`] after the client's retry budget is spent.
    pub async fn lookup(&self, order_id: i64) -> Result<OrderDetails, LookupError> {
        tracing::debug!(order_id, "looking up order");
        self.api
            .get(&format!("/orders/{order_id}/details"))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    LookupError::NotFound(order_id)
                } else {
                    LookupError::Api(e)
                }
            })
    }
}
