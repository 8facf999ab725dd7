//! Cart - 收银台当前订单
//!
//! 每次选择菜单项追加一行；提交时按菜品合并数量。金额仅供显示，
//! 最终总价以服务端计算为准。

use rust_decimal::prelude::*;
use shared::{Dish, OrderItem, OrderType};

#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<Dish>,
    order_type: OrderType,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dish: &Dish) {
        self.lines.push(dish.clone());
    }

    /// Remove one line by position
    pub fn remove(&mut self, index: usize) -> Option<Dish> {
        (index < self.lines.len()).then(|| self.lines.remove(index))
    }

    pub fn lines(&self) -> &[Dish] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn toggle_order_type(&mut self) {
        self.order_type = match self.order_type {
            OrderType::Dinein => OrderType::Delivery,
            OrderType::Delivery => OrderType::Dinein,
        };
    }

    /// Order lines grouped by dish, in first-added order
    pub fn items(&self) -> Vec<OrderItem> {
        let mut items: Vec<OrderItem> = Vec::new();
        for dish in &self.lines {
            match items.iter_mut().find(|i| i.id_dish == dish.id) {
                Some(item) => item.quantity += 1,
                None => items.push(OrderItem {
                    id_dish: dish.id.clone(),
                    quantity: 1,
                    selected_extras: vec![],
                }),
            }
        }
        items
    }

    /// Estimated total (2 decimal places)
    pub fn total(&self) -> f64 {
        self.lines
            .iter()
            .map(|d| Decimal::from_f64(d.cost_unit).unwrap_or_default())
            .sum::<Decimal>()
            .round_dp(2)
            .to_f64()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dish(id: &str, cost_unit: f64) -> Dish {
        Dish {
            id: id.into(),
            title: id.into(),
            description: None,
            cost_unit,
            id_categories: vec![],
            preview_image: None,
            extras: vec![],
        }
    }

    #[test]
    fn test_items_grouped_by_dish() {
        let mut cart = Cart::new();
        let burger = dish("D1", 10.0);
        let fries = dish("D2", 3.5);
        cart.add(&fries);
        cart.add(&burger);
        cart.add(&fries);

        let items = cart.items();
        assert_eq!(items.len(), 2);
        assert_eq!((items[0].id_dish.as_str(), items[0].quantity), ("D2", 2));
        assert_eq!((items[1].id_dish.as_str(), items[1].quantity), ("D1", 1));
        assert_eq!(cart.total(), 17.0);
    }

    #[test]
    fn test_total_has_no_float_drift() {
        let mut cart = Cart::new();
        for _ in 0..3 {
            cart.add(&dish("D1", 0.1));
        }
        assert_eq!(cart.total(), 0.3);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(&dish("D1", 1.0));
        cart.add(&dish("D2", 2.0));
        assert_eq!(cart.remove(5), None);
        assert_eq!(cart.remove(0).map(|d| d.id), Some("D1".to_string()));
        assert_eq!(cart.len(), 1);
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.items().is_empty());
    }

    #[test]
    fn test_toggle_order_type() {
        let mut cart = Cart::new();
        assert_eq!(cart.order_type(), OrderType::default());
        cart.toggle_order_type();
        assert_ne!(cart.order_type(), OrderType::default());
        cart.toggle_order_type();
        assert_eq!(cart.order_type(), OrderType::default());
    }
}
