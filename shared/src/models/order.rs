//! Order Model
//!
//! Wire names follow the storefront API (`_id`, `id_user`, `total_cost`, `type`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::dish::DishExtra;

/// Order status, forward-only: preparing → done → delivered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Preparing,
    Done,
    Delivered,
}

impl OrderStatus {
    /// The only status this one may move to, if any
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Preparing => Some(OrderStatus::Done),
            OrderStatus::Done => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }

    /// 只允许前进一步，不允许跳过 done
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.next() == Some(target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Preparing => "preparing",
            OrderStatus::Done => "done",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparing" => Ok(OrderStatus::Preparing),
            "done" => Ok(OrderStatus::Done),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// Order type, fixed at creation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Dinein,
    #[default]
    Delivery,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Dinein => "dinein",
            OrderType::Delivery => "delivery",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line item of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct OrderItem {
    #[validate(length(min = 1))]
    pub id_dish: String,
    pub quantity: u32,
    /// Extras snapshot copied at order time, never a live catalog reference
    #[serde(default)]
    pub selected_extras: Vec<DishExtra>,
}

/// Persisted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub id_user: String,
    pub items: Vec<OrderItem>,
    pub total_cost: f64,
    pub status: OrderStatus,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Starts at 1, +1 on every mutation. Snapshots without it decode as 0.
    #[serde(default)]
    pub version: u64,
}

/// Checkout payload (`POST /orders`)
///
/// A client-sent `total_cost` is ignored; the server always prices the order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(nested)]
    pub items: Vec<OrderItem>,
    #[serde(default, rename = "type")]
    pub order_type: OrderType,
}

/// `PUT /orders/{id}/status`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// `GET /orders` filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    /// Inclusive lower bound on `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| s == order.status)
            && self.order_type.is_none_or(|t| t == order.order_type)
            && self.from.is_none_or(|from| order.created_at >= from)
            && self.to.is_none_or(|to| order.created_at <= to)
    }
}
