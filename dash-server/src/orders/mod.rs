//! 订单模块
//!
//! - [`OrderStore`] / [`OrderStorage`] - redb 持久化，状态迁移 compare-and-set
//! - [`OrderService`] - 创建订单、推进状态、发布事件

mod service;
mod storage;

pub use service::{Committed, OrderService, Propagation};
pub use storage::{OrderStorage, OrderStore};
