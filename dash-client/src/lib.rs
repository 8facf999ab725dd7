//! Dash Client - terminal-side access to dash-server
//!
//! - [`ApiClient`]: REST calls (login, orders, dishes)
//! - [`OrderFeed`]: `/ws/orders` subscriber with reconnect + backfill
//! - [`OrderBoard`]: 客户端订单列表，按快照合并
//! - [`Cart`]: 收银台点单
//! - [`AdminFilter`]: 管理端类型 / 日期过滤

pub mod board;
pub mod config;
pub mod error;
pub mod feed;
pub mod filter;
pub mod http;
pub mod register;

pub use board::{Applied, ConnectionState, OrderBoard};
pub use config::{ClientConfig, Screen};
pub use error::{ClientError, ClientResult};
pub use feed::{FeedEvent, OrderFeed};
pub use filter::AdminFilter;
pub use http::{ApiClient, OrderWrite, Propagation};
pub use register::Cart;

// Re-export shared types for convenience
pub use shared::models::{LoginResponse, OrderQuery};
pub use shared::{Order, OrderStatus, OrderType};
