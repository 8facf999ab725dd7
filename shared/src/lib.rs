//! Shared types for DashDish
//!
//! Common types used by dash-server and dash-client: order/dish/session
//! models, queue names, and the unified error system.

pub mod error;
pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use message::OrderEvent;
pub use models::{Dish, DishExtra, Order, OrderItem, OrderStatus, OrderType, Role};
