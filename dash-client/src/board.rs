//! OrderBoard - 终端持有的订单列表
//!
//! 实时推送和重连回补都通过 [`OrderBoard::apply`] 合并：同 id 原位替换，
//! 新 id 插到最前。版本号低于已持有快照的推送被丢弃，重复推送无副作用。

use shared::Order;

/// Realtime connection status shown next to the board
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected { reason: Option<String> },
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected { .. } => "disconnected",
        }
    }
}

/// Outcome of merging one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    /// Older than the held snapshot, ignored
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct OrderBoard {
    orders: Vec<Order>,
    connection: ConnectionState,
    last_error: Option<String>,
}

impl OrderBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, snapshot: Order) -> Applied {
        match self.orders.iter_mut().find(|o| o.id == snapshot.id) {
            Some(held) if snapshot.version < held.version => {
                tracing::debug!(
                    order_id = %snapshot.id,
                    held = held.version,
                    incoming = snapshot.version,
                    "Stale order snapshot dropped"
                );
                Applied::Stale
            }
            Some(held) => {
                *held = snapshot;
                Applied::Replaced
            }
            None => {
                self.orders.insert(0, snapshot);
                Applied::Inserted
            }
        }
    }

    /// Merge a newest-first listing (e.g. `GET /orders` backfill)
    ///
    /// 逆序合并，保证最新的订单最终排在最前。返回新插入的数量。
    pub fn merge_listing(&mut self, newest_first: Vec<Order>) -> usize {
        newest_first
            .into_iter()
            .rev()
            .map(|order| self.apply(order))
            .filter(|applied| *applied == Applied::Inserted)
            .count()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        if state == ConnectionState::Connected {
            self.last_error = None;
        }
        self.connection = state;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::{OrderStatus, OrderType};

    fn order(id: &str, status: OrderStatus, version: u64) -> Order {
        Order {
            id: id.into(),
            id_user: "u-1".into(),
            items: vec![],
            total_cost: 10.0,
            status,
            order_type: OrderType::Delivery,
            created_at: Utc::now(),
            updated_at: None,
            version,
        }
    }

    #[test]
    fn test_new_orders_prepend() {
        let mut board = OrderBoard::new();
        assert_eq!(board.apply(order("a", OrderStatus::Preparing, 1)), Applied::Inserted);
        assert_eq!(board.apply(order("b", OrderStatus::Preparing, 1)), Applied::Inserted);
        let ids: Vec<_> = board.orders().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut board = OrderBoard::new();
        board.apply(order("a", OrderStatus::Preparing, 1));
        board.apply(order("b", OrderStatus::Preparing, 1));

        assert_eq!(board.apply(order("a", OrderStatus::Done, 2)), Applied::Replaced);
        assert_eq!(board.len(), 2);
        assert_eq!(board.orders()[1].id, "a");
        assert_eq!(board.orders()[1].status, OrderStatus::Done);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut board = OrderBoard::new();
        let snapshot = order("a", OrderStatus::Done, 2);
        board.apply(snapshot.clone());
        let before = board.orders().to_vec();

        assert_eq!(board.apply(snapshot), Applied::Replaced);
        assert_eq!(board.orders(), before.as_slice());
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let mut board = OrderBoard::new();
        board.apply(order("a", OrderStatus::Done, 2));

        // 迟到的 orders:new 不能把状态改回 preparing
        assert_eq!(board.apply(order("a", OrderStatus::Preparing, 1)), Applied::Stale);
        assert_eq!(board.get("a").unwrap().status, OrderStatus::Done);
    }

    #[test]
    fn test_merge_listing_keeps_newest_first() {
        let mut board = OrderBoard::new();
        board.apply(order("b", OrderStatus::Preparing, 1));

        let listing = vec![
            order("c", OrderStatus::Preparing, 1),
            order("b", OrderStatus::Done, 2),
            order("a", OrderStatus::Delivered, 3),
        ];
        assert_eq!(board.merge_listing(listing), 2);

        let ids: Vec<_> = board.orders().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(board.get("b").unwrap().version, 2);
    }

    #[test]
    fn test_connected_clears_error() {
        let mut board = OrderBoard::new();
        board.set_error("connection refused");
        board.set_connection(ConnectionState::Disconnected {
            reason: Some("connection refused".into()),
        });
        assert_eq!(board.last_error(), Some("connection refused"));

        board.set_connection(ConnectionState::Connected);
        assert_eq!(board.last_error(), None);
        assert_eq!(board.connection().as_str(), "connected");
    }
}
