use std::sync::Arc;

use redb::{Database, ReadableDatabase, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::Role;

use crate::db::StorageResult;

/// Table for users: key = email, value = JSON-serialized User
const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct UserStore {
    db: Arc<Database>,
}

impl UserStore {
    pub fn new(db: Arc<Database>) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Insert or replace by email
    pub fn upsert(&self, user: &User) -> StorageResult<()> {
        let bytes = serde_json::to_vec(user)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(USERS_TABLE)?;
            table.insert(normalize(&user.email).as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USERS_TABLE)?;
        match table.get(normalize(email).as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    #[test]
    fn test_email_lookup_is_case_insensitive() {
        let store = UserStore::new(DbService::open_in_memory().unwrap().db).unwrap();
        let user = User {
            id: "u-1".into(),
            email: "Kitchen@Dash.local".into(),
            password_hash: "$argon2id$...".into(),
            role: Role::Kitchen,
        };
        store.upsert(&user).unwrap();

        let found = store.find_by_email("kitchen@dash.local").unwrap().unwrap();
        assert_eq!(found, user);
        assert!(store.find_by_email("admin@dash.local").unwrap().is_none());
    }
}
