//! OrderService - 订单生命周期
//!
//! # Create Flow
//!
//! ```text
//! create_order(session, items, type)
//!     ├─ 1. items 非空
//!     ├─ 2. 解析所有菜品 (任一缺失则整单拒绝)
//!     ├─ 3. Price Calculator 计算总价
//!     ├─ 4. 持久化 (status = preparing, version = 1)
//!     ├─ 5. 发布 orders:new
//!     └─ 6. 返回 Committed { order, propagation }
//! ```
//!
//! 发布只在持久化成功之后进行。发布失败不回滚订单，结果里标记为 `Degraded`。
//! 发布耗时受 `publish_timeout` 约束，超时同样记为 `Degraded`，
//! 已落库的订单总能在请求超时之前返回给调用方。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared::models::OrderQuery;
use shared::{AppError, AppResult, Dish, Order, OrderEvent, OrderItem, OrderStatus, OrderType};

use super::storage::OrderStore;
use crate::auth::CurrentSession;
use crate::catalog::DishCatalog;
use crate::pricing::price_order;
use crate::pubsub::OrderEventSink;

/// 订单写入后，事件是否已交给代理
#[derive(Debug, Clone, PartialEq)]
pub enum Propagation {
    Published,
    /// 订单已落库，但事件发布失败
    Degraded(String),
}

impl Propagation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Published => "published",
            Propagation::Degraded(_) => "degraded",
        }
    }
}

/// Result of a committed mutation
#[derive(Debug, Clone)]
pub struct Committed {
    pub order: Order,
    pub propagation: Propagation,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    dishes: Arc<dyn DishCatalog>,
    events: Arc<dyn OrderEventSink>,
    publish_timeout: Option<Duration>,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        dishes: Arc<dyn DishCatalog>,
        events: Arc<dyn OrderEventSink>,
    ) -> Self {
        Self {
            orders,
            dishes,
            events,
            publish_timeout: None,
        }
    }

    /// 限制单次事件发布 (含重连) 的耗时
    pub fn with_publish_timeout(mut self, limit: Duration) -> Self {
        self.publish_timeout = Some(limit);
        self
    }

    pub async fn create_order(
        &self,
        session: &CurrentSession,
        items: Vec<OrderItem>,
        order_type: OrderType,
    ) -> AppResult<Committed> {
        if items.is_empty() {
            return Err(AppError::order_empty());
        }

        let dishes = self.resolve_dishes(&items).await?;
        let priced = price_order(&items, &dishes)?;

        let order = Order {
            id: shared::util::new_id(),
            id_user: session.user_id.clone(),
            items: priced.items,
            total_cost: priced.total_cost,
            status: OrderStatus::Preparing,
            order_type,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        };

        self.orders.insert(&order).await?;
        tracing::info!(
            order_id = %order.id,
            user_id = %order.id_user,
            total_cost = order.total_cost,
            items = order.items.len(),
            "Order created"
        );

        let propagation = self.propagate(OrderEvent::Created, &order).await;
        Ok(Committed { order, propagation })
    }

    pub async fn update_order_status(&self, id: &str, status: OrderStatus) -> AppResult<Committed> {
        let current = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::order_not_found(id))?;

        if !current.status.can_transition_to(status) {
            return Err(AppError::invalid_transition(
                current.status.as_str(),
                status.as_str(),
            ));
        }

        // compare-and-set: 并发请求中只有一个能从 current.status 前进
        let order = self
            .orders
            .transition(id, current.status, status, Utc::now())
            .await?;
        tracing::info!(
            order_id = %order.id,
            from = %current.status,
            to = %order.status,
            version = order.version,
            "Order status updated"
        );

        let propagation = self.propagate(OrderEvent::StatusChanged, &order).await;
        Ok(Committed { order, propagation })
    }

    pub async fn get_order(&self, id: &str) -> AppResult<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::order_not_found(id))
    }

    pub async fn list_orders(&self, query: &OrderQuery) -> AppResult<Vec<Order>> {
        Ok(self.orders.list(query).await?)
    }

    async fn resolve_dishes(&self, items: &[OrderItem]) -> AppResult<HashMap<String, Dish>> {
        let mut dishes = HashMap::new();
        for item in items {
            if dishes.contains_key(&item.id_dish) {
                continue;
            }
            let dish = self
                .dishes
                .get(&item.id_dish)
                .await?
                .ok_or_else(|| AppError::dish_not_found(&item.id_dish))?;
            dishes.insert(item.id_dish.clone(), dish);
        }
        Ok(dishes)
    }

    async fn propagate(&self, event: OrderEvent, order: &Order) -> Propagation {
        let publish = self.events.publish_order(event, order);
        let result = match self.publish_timeout {
            Some(limit) => match tokio::time::timeout(limit, publish).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("publish timed out after {}ms", limit.as_millis())),
            },
            None => publish.await.map_err(|e| e.to_string()),
        };
        match result {
            Ok(()) => Propagation::Published,
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    event = %event,
                    error = %e,
                    "Order committed but event not propagated"
                );
                Propagation::Degraded(e)
            }
        }
    }
}
