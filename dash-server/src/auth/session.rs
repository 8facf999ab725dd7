use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use redb::{Database, ReadableDatabase, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::{AppError, AppResult, Role};

use super::User;
use crate::db::StorageResult;

/// Table for sessions: key = session id, value = JSON-serialized Session
const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Persistent session records
#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Database>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(db: Arc<Database>, ttl: std::time::Duration) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS_TABLE)?;
        }
        write_txn.commit()?;
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(1));
        Ok(Self { db, ttl })
    }

    /// Issue a new session for a verified user
    pub fn create(&self, user: &User) -> StorageResult<Session> {
        let now = Utc::now();
        let session = Session {
            session_id: shared::util::new_id(),
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let bytes = serde_json::to_vec(&session)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SESSIONS_TABLE)?;
            table.insert(session.session_id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(session)
    }

    /// Look up a session id
    ///
    /// Unknown ids yield `NotAuthenticated`; expired ones are removed and yield `SessionExpired`.
    pub fn resolve(&self, session_id: &str) -> AppResult<Session> {
        self.resolve_at(session_id, Utc::now())
    }

    fn resolve_at(&self, session_id: &str, now: DateTime<Utc>) -> AppResult<Session> {
        let session = {
            let txn = self.db.begin_read().map_err(storage_err)?;
            let table = txn.open_table(SESSIONS_TABLE).map_err(storage_err)?;
            match table.get(session_id).map_err(storage_err)? {
                Some(guard) => serde_json::from_slice::<Session>(guard.value())
                    .map_err(|e| AppError::internal(e.to_string()))?,
                None => return Err(AppError::not_authenticated()),
            }
        };

        if session.is_expired(now) {
            self.revoke(session_id)?;
            return Err(AppError::session_expired());
        }
        Ok(session)
    }

    /// Delete a session. Unknown ids are ignored.
    pub fn revoke(&self, session_id: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SESSIONS_TABLE)?;
            table.remove(session_id)?;
        }
        txn.commit()?;
        Ok(())
    }
}

fn storage_err(e: impl Into<crate::db::StorageError>) -> AppError {
    AppError::from(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use shared::ErrorCode;

    fn store() -> SessionStore {
        SessionStore::new(
            DbService::open_in_memory().unwrap().db,
            std::time::Duration::from_secs(60),
        )
        .unwrap()
    }

    fn user() -> User {
        User {
            id: "u-1".into(),
            email: "admin@dash.local".into(),
            password_hash: String::new(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_create_and_resolve() {
        let store = store();
        let session = store.create(&user()).unwrap();
        assert_eq!(session.expires_at - session.created_at, Duration::seconds(60));

        let resolved = store.resolve(&session.session_id).unwrap();
        assert_eq!(resolved, session);
    }

    #[test]
    fn test_unknown_session() {
        let err = store().resolve("nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
    }

    #[test]
    fn test_expired_session_is_removed() {
        let store = store();
        let session = store.create(&user()).unwrap();

        let later = session.expires_at + Duration::seconds(1);
        let err = store.resolve_at(&session.session_id, later).unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionExpired);

        // 过期后记录已删除
        let err = store.resolve(&session.session_id).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
    }

    #[test]
    fn test_revoke() {
        let store = store();
        let session = store.create(&user()).unwrap();
        store.revoke(&session.session_id).unwrap();
        store.revoke(&session.session_id).unwrap();
        assert!(store.resolve(&session.session_id).is_err());
    }
}
