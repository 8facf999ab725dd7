//! Dish Model (read-only catalog)

use serde::{Deserialize, Serialize};

/// Optional add-on of a dish
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishExtra {
    pub name: String,
    pub cost: f64,
}

/// Dish entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dish {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit price
    pub cost_unit: f64,
    #[serde(default)]
    pub id_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    #[serde(default)]
    pub extras: Vec<DishExtra>,
}

impl Dish {
    /// Catalog entry for an extra, matched by name
    pub fn extra(&self, name: &str) -> Option<&DishExtra> {
        self.extras.iter().find(|e| e.name == name)
    }
}

/// `GET /dishes` paging (offset/limit)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

impl Default for DishQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
        }
    }
}

impl DishQuery {
    /// Limit clamped to 100
    pub fn limit(&self) -> usize {
        self.limit.min(100)
    }
}
