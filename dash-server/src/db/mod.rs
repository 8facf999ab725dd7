//! redb 存储层
//!
//! 一个数据库文件 `work_dir/database/dash.redb`，各个 store 共享同一个 [`Database`]
//! 并各自管理自己的表。值均为 JSON 序列化的文档。
//!
//! | Table | Key | Value | Owner |
//! |-------|-----|-------|-------|
//! | `orders` | `_id` | `Order` | [`OrderStorage`](crate::orders::OrderStorage) |
//! | `dishes` | `_id` | `Dish` | [`DishStorage`](crate::catalog::DishStorage) |
//! | `users` | email | `User` | [`UserStore`](crate::auth::UserStore) |
//! | `sessions` | session id | `Session` | [`SessionStore`](crate::auth::SessionStore) |
//!
//! # Durability
//!
//! redb 默认 `Durability::Immediate`：`commit()` 返回即持久化，单文档写入是原子的。

use std::path::Path;
use std::sync::Arc;

use redb::Database;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 状态迁移不合法，或 compare-and-set 时当前状态已被他人修改
    #[error("Order {id} is {actual}, cannot move to {requested}")]
    StatusConflict {
        id: String,
        actual: shared::OrderStatus,
        requested: shared::OrderStatus,
    },

    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for shared::AppError {
    fn from(err: StorageError) -> Self {
        use shared::{AppError, ErrorCode};
        match err {
            StorageError::OrderNotFound(id) => AppError::order_not_found(id),
            StorageError::StatusConflict {
                actual, requested, ..
            } => AppError::invalid_transition(actual.as_str(), requested.as_str()),
            StorageError::Duplicate(key) => AppError::with_message(
                ErrorCode::AlreadyExists,
                format!("Duplicate key: {}", key),
            ),
            other => AppError::database(other.to_string()),
        }
    }
}

/// 数据库句柄 (Arc 浅拷贝)
#[derive(Clone)]
pub struct DbService {
    pub db: Arc<Database>,
}

impl DbService {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl std::fmt::Debug for DbService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbService").finish_non_exhaustive()
    }
}
