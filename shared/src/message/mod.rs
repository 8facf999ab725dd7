//! 订单生命周期消息
//!
//! 队列名在 dash-server（发布方 / relay 消费方）和 dash-client 之间共享。
//! 消息体就是完整的 [`Order`](crate::models::Order) JSON 快照。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 新订单队列
pub const ORDERS_NEW: &str = "orders:new";
/// 状态变更队列（携带完整订单）
pub const ORDERS_UPDATED: &str = "orders:updated";

/// 所有已知队列，连接后逐个声明为 durable
pub const ALL_QUEUES: [&str; 2] = [ORDERS_NEW, ORDERS_UPDATED];

/// 订单事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    Created,
    StatusChanged,
}

impl OrderEvent {
    /// 事件对应的目标队列
    pub fn queue(&self) -> &'static str {
        match self {
            OrderEvent::Created => ORDERS_NEW,
            OrderEvent::StatusChanged => ORDERS_UPDATED,
        }
    }

    pub fn from_queue(queue: &str) -> Option<Self> {
        match queue {
            ORDERS_NEW => Some(OrderEvent::Created),
            ORDERS_UPDATED => Some(OrderEvent::StatusChanged),
            _ => None,
        }
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEvent::Created => write!(f, "created"),
            OrderEvent::StatusChanged => write!(f, "status_changed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_mapping() {
        for event in [OrderEvent::Created, OrderEvent::StatusChanged] {
            assert_eq!(OrderEvent::from_queue(event.queue()), Some(event));
        }
        assert_eq!(OrderEvent::from_queue("orders:deleted"), None);
        assert_eq!(ALL_QUEUES, ["orders:new", "orders:updated"]);
    }
}
