//! Seed import
//!
//! 启动时可选导入 `SEED_FILE`：
//!
//! ```json
//! {
//!   "dishes": [{"_id": "D1", "title": "Burger", "cost_unit": 10.0, "extras": [{"name": "Cheese", "cost": 1.0}]}],
//!   "users": [{"email": "kitchen@dash.local", "password": "kitchen", "role": "kitchen"}]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use shared::{Dish, Role};
use thiserror::Error;

use super::DishStorage;
use crate::auth::{User, UserStore, hash_password};
use crate::db::StorageError;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to hash password for {email}: {reason}")]
    Hash { email: String, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub dishes: Vec<Dish>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// Plain-text password, hashed on import
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub dishes: usize,
    pub users: usize,
}

pub fn import_seed(
    path: &Path,
    dishes: &DishStorage,
    users: &UserStore,
) -> Result<SeedSummary, SeedError> {
    let raw = std::fs::read_to_string(path)?;
    let seed: SeedFile = serde_json::from_str(&raw)?;
    apply_seed(seed, dishes, users)
}

fn apply_seed(
    seed: SeedFile,
    dishes: &DishStorage,
    users: &UserStore,
) -> Result<SeedSummary, SeedError> {
    let dish_count = dishes.upsert(&seed.dishes)?;

    for entry in &seed.users {
        let password_hash = hash_password(&entry.password).map_err(|e| SeedError::Hash {
            email: entry.email.clone(),
            reason: e.to_string(),
        })?;
        // 重复导入时保留原 id
        let id = users
            .find_by_email(&entry.email)?
            .map(|u| u.id)
            .unwrap_or_else(shared::util::new_id);
        users.upsert(&User {
            id,
            email: entry.email.clone(),
            password_hash,
            role: entry.role,
        })?;
    }

    let summary = SeedSummary {
        dishes: dish_count,
        users: seed.users.len(),
    };
    tracing::info!(dishes = summary.dishes, users = summary.users, "Seed data imported");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::catalog::DishCatalog;
    use crate::db::DbService;

    const SEED: &str = r#"{
        "dishes": [
            {"_id": "D1", "title": "Burger", "cost_unit": 10.0, "extras": [{"name": "Cheese", "cost": 1.0}]},
            {"_id": "D2", "title": "Fries", "cost_unit": 3.5}
        ],
        "users": [
            {"email": "kitchen@dash.local", "password": "kitchen", "role": "kitchen"}
        ]
    }"#;

    #[tokio::test]
    async fn test_import_from_file() {
        let db = DbService::open_in_memory().unwrap().db;
        let dishes = DishStorage::new(db.clone()).unwrap();
        let users = UserStore::new(db).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, SEED).unwrap();

        let summary = import_seed(&path, &dishes, &users).unwrap();
        assert_eq!(summary, SeedSummary { dishes: 2, users: 1 });

        let burger = dishes.get("D1").await.unwrap().unwrap();
        assert_eq!(burger.extras.len(), 1);

        let kitchen = users.find_by_email("kitchen@dash.local").unwrap().unwrap();
        assert_eq!(kitchen.role, Role::Kitchen);
        assert!(verify_password("kitchen", &kitchen.password_hash));

        // 再次导入不改变用户 id
        import_seed(&path, &dishes, &users).unwrap();
        let again = users.find_by_email("kitchen@dash.local").unwrap().unwrap();
        assert_eq!(again.id, kitchen.id);
    }

    #[test]
    fn test_missing_file() {
        let db = DbService::open_in_memory().unwrap().db;
        let dishes = DishStorage::new(db.clone()).unwrap();
        let users = UserStore::new(db).unwrap();
        let err = import_seed(Path::new("/nonexistent/seed.json"), &dishes, &users).unwrap_err();
        assert!(matches!(err, SeedError::Io(_)));
    }
}
