//! Order total calculation
//!
//! total = Σ quantity × (cost_unit + Σ selected extra costs)

use std::collections::HashMap;

use rust_decimal::prelude::*;
use shared::{AppError, Dish, DishExtra, OrderItem};
use thiserror::Error;

/// Rounding strategy for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for comparing a client-sent extra cost with the catalog (0.01)
const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("Quantity of dish {id_dish} must be at least 1")]
    InvalidQuantity { id_dish: String },

    #[error("Dish {id_dish} has no extra named {name}")]
    UnknownExtra { id_dish: String, name: String },

    #[error("Extra {name} of dish {id_dish} costs {expected}, got {actual}")]
    ExtraCostMismatch {
        id_dish: String,
        name: String,
        expected: f64,
        actual: f64,
    },

    #[error("Amount for dish {id_dish} is out of range")]
    AmountOverflow { id_dish: String },

    /// 调用方必须先解析所有菜品
    #[error("Dish not resolved: {0}")]
    UnresolvedDish(String),
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::UnresolvedDish(id) => AppError::dish_not_found(id),
            other => AppError::invalid_item(other.to_string()),
        }
    }
}

/// Priced order lines
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    /// 行项目，extras 已替换为目录快照
    pub items: Vec<OrderItem>,
    pub total_cost: f64,
}

/// Price the given items against the resolved dishes (keyed by `_id`).
///
/// Extras must exist in the dish's catalog; a client-sent cost that differs
/// from the catalog is rejected. The returned items carry the catalog copy.
pub fn price_order(
    items: &[OrderItem],
    dishes: &HashMap<String, Dish>,
) -> Result<PricedOrder, PricingError> {
    let mut total = Decimal::ZERO;
    let mut priced = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity < 1 {
            return Err(PricingError::InvalidQuantity {
                id_dish: item.id_dish.clone(),
            });
        }
        let dish = dishes
            .get(&item.id_dish)
            .ok_or_else(|| PricingError::UnresolvedDish(item.id_dish.clone()))?;

        let extras = resolve_extras(dish, &item.selected_extras)?;
        let overflow = || PricingError::AmountOverflow {
            id_dish: item.id_dish.clone(),
        };
        let unit = extras
            .iter()
            .try_fold(to_decimal(dish.cost_unit), |acc, e| acc.checked_add(to_decimal(e.cost)))
            .ok_or_else(overflow)?;
        total = unit
            .checked_mul(Decimal::from(item.quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(overflow)?;

        priced.push(OrderItem {
            id_dish: item.id_dish.clone(),
            quantity: item.quantity,
            selected_extras: extras,
        });
    }

    Ok(PricedOrder {
        items: priced,
        total_cost: to_f64(total),
    })
}

fn resolve_extras(dish: &Dish, selected: &[DishExtra]) -> Result<Vec<DishExtra>, PricingError> {
    selected
        .iter()
        .map(|sel| {
            let catalog = dish
                .extra(&sel.name)
                .ok_or_else(|| PricingError::UnknownExtra {
                    id_dish: dish.id.clone(),
                    name: sel.name.clone(),
                })?;
            if (to_decimal(sel.cost) - to_decimal(catalog.cost)).abs() >= MONEY_TOLERANCE {
                return Err(PricingError::ExtraCostMismatch {
                    id_dish: dish.id.clone(),
                    name: sel.name.clone(),
                    expected: catalog.cost,
                    actual: sel.cost,
                });
            }
            Ok(catalog.clone())
        })
        .collect()
}
