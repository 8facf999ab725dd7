//! Order Store
//!
//! 订单的唯一事实来源。redb 单文档写入是原子的；状态迁移在一个写事务里
//! 完成 compare-and-set，store 本身拒绝任何非前进一步的迁移。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::models::OrderQuery;
use shared::{Order, OrderStatus};
use std::sync::Arc;

use crate::db::{StorageError, StorageResult};

/// Table for orders: key = order id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// 订单持久化接口
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// 插入新订单，id 已存在时返回 `Duplicate`
    async fn insert(&self, order: &Order) -> StorageResult<()>;

    async fn get(&self, id: &str) -> StorageResult<Option<Order>>;

    /// 原子地把状态从 `expected` 改为 `next`，同时写入 `updated_at` 并递增 `version`
    async fn transition(
        &self,
        id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<Order>;

    /// 按条件列出订单，最新的在前
    async fn list(&self, query: &OrderQuery) -> StorageResult<Vec<Order>>;
}

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl OrderStorage {
    pub fn new(db: Arc<Database>) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }
}

#[async_trait]
impl OrderStore for OrderStorage {
    async fn insert(&self, order: &Order) -> StorageResult<()> {
        let bytes = serde_json::to_vec(order)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            if table.get(order.id.as_str())?.is_some() {
                return Err(StorageError::Duplicate(order.id.clone()));
            }
            table.insert(order.id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Order>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<Order> {
        let txn = self.db.begin_write()?;
        let order = {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let mut order: Order = match table.get(id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(StorageError::OrderNotFound(id.to_string())),
            };

            if order.status != expected || !order.status.can_transition_to(next) {
                return Err(StorageError::StatusConflict {
                    id: id.to_string(),
                    actual: order.status,
                    requested: next,
                });
            }

            order.status = next;
            order.updated_at = Some(at);
            order.version += 1;

            let bytes = serde_json::to_vec(&order)?;
            table.insert(id, bytes.as_slice())?;
            order
        };
        txn.commit()?;
        Ok(order)
    }

    async fn list(&self, query: &OrderQuery) -> StorageResult<Vec<Order>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        let mut orders = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let order: Order = serde_json::from_slice(value.value())?;
            if query.matches(&order) {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}
