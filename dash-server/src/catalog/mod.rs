//! Dish catalog (read-only collaborator of the Order Service)

mod seed;
mod storage;

pub use seed::{SeedError, SeedFile, SeedSummary, SeedUser, import_seed};
pub use storage::{DishCatalog, DishStorage};
