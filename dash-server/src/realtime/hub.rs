use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use shared::Order;
use tokio::sync::broadcast;

/// Per-subscriber buffer; a socket that falls this far behind is closed
const HUB_CAPACITY: usize = 256;

/// 进程内订单快照广播
#[derive(Debug, Clone)]
pub struct OrderHub {
    tx: broadcast::Sender<Order>,
    connections: Arc<AtomicUsize>,
}

impl OrderHub {
    pub fn new() -> Self {
        Self::with_capacity(HUB_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 广播一个快照，返回接收者数量（没有连接时为 0）
    pub fn publish(&self, order: Order) -> usize {
        self.tx.send(order).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Order> {
        self.tx.subscribe()
    }

    /// Count an open socket until the guard drops
    pub fn track_connection(&self) -> ConnectionGuard {
        self.connections.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            connections: self.connections.clone(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Default for OrderHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}
