use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::Dish;

use crate::db::StorageResult;

/// Table for dishes: key = dish id, value = JSON-serialized Dish
const DISHES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("dishes");

/// 菜品目录查询接口
#[async_trait]
pub trait DishCatalog: Send + Sync {
    async fn get(&self, id: &str) -> StorageResult<Option<Dish>>;

    /// 按 `_id` 排序分页
    async fn list(&self, offset: usize, limit: usize) -> StorageResult<Vec<Dish>>;
}

#[derive(Clone)]
pub struct DishStorage {
    db: Arc<Database>,
}

impl DishStorage {
    pub fn new(db: Arc<Database>) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DISHES_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Insert or replace dishes in one transaction
    pub fn upsert(&self, dishes: &[Dish]) -> StorageResult<usize> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DISHES_TABLE)?;
            for dish in dishes {
                let bytes = serde_json::to_vec(dish)?;
                table.insert(dish.id.as_str(), bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(dishes.len())
    }
}

#[async_trait]
impl DishCatalog for DishStorage {
    async fn get(&self, id: &str) -> StorageResult<Option<Dish>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DISHES_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn list(&self, offset: usize, limit: usize) -> StorageResult<Vec<Dish>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DISHES_TABLE)?;
        let mut dishes = Vec::new();
        for entry in table.iter()?.skip(offset).take(limit) {
            let (_, value) = entry?;
            dishes.push(serde_json::from_slice(value.value())?);
        }
        Ok(dishes)
    }
}
