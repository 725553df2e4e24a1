//! SQLite 凭证存储适配器
//!
//! 在 `Database` 之上实现 `CredentialStore` 契约。
//! SQLite 调用本身是同步的，锁内不跨 await 点。

use crate::dao::ApiKeyDao;
use crate::db::Database;
use aeroview_core::{now_ms, ApiKeyRecord, StoreError};
use aeroview_credential::CredentialStore;
use async_trait::async_trait;

/// 基于 SQLite 的凭证存储
pub struct SqliteCredentialStore {
    db: Database,
}

impl SqliteCredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn list(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let conn = self.db.conn().lock();
        ApiKeyDao::list_all(&conn).map_err(db_err)
    }

    async fn get_active(&self) -> Result<Option<ApiKeyRecord>, StoreError> {
        let conn = self.db.conn().lock();
        ApiKeyDao::get_active(&conn).map_err(db_err)
    }

    async fn insert(&self, secret: &str) -> Result<ApiKeyRecord, StoreError> {
        let now = now_ms();
        let conn = self.db.conn().lock();
        let id = ApiKeyDao::insert(&conn, secret, now).map_err(db_err)?;
        Ok(ApiKeyRecord {
            id,
            secret: secret.to_string(),
            is_active: false,
            activated_at: 0,
            error_count: 0,
            last_used_at: 0,
            created_at: now,
        })
    }

    async fn update(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        let conn = self.db.conn().lock();
        let updated = ApiKeyDao::update(&conn, record).map_err(db_err)?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::InvalidRecord(format!(
                "凭证 {} 不存在",
                record.id
            )))
        }
    }

    async fn deactivate_all(&self) -> Result<(), StoreError> {
        let conn = self.db.conn().lock();
        ApiKeyDao::deactivate_all(&conn).map_err(db_err)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.db.conn().lock();
        ApiKeyDao::delete(&conn, id).map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeroview_core::ManagerConfig;
    use aeroview_credential::CredentialManager;
    use std::sync::Arc;

    fn sqlite_store() -> SqliteCredentialStore {
        SqliteCredentialStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_store_contract_roundtrip() {
        let store = sqlite_store();

        let mut record = store.insert("sk-a").await.unwrap();
        store.insert("sk-b").await.unwrap();
        assert!(store.get_active().await.unwrap().is_none());

        record.is_active = true;
        record.activated_at = 7;
        store.update(&record).await.unwrap();
        assert_eq!(store.get_active().await.unwrap().unwrap().id, record.id);

        store.deactivate_all().await.unwrap();
        assert!(store.get_active().await.unwrap().is_none());

        assert!(store.delete(record.id).await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_error() {
        let store = sqlite_store();
        let mut record = store.insert("sk-a").await.unwrap();
        record.id = 99;
        assert!(store.update(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_manager_over_sqlite() {
        // 管理器跑在 SQLite 存储上的冒烟路径
        let manager = CredentialManager::new(Arc::new(sqlite_store()), ManagerConfig::default());

        assert!(manager.add_credential("sk-a").await);
        assert!(manager.add_credential("sk-b").await);
        assert_eq!(manager.get_active_credential().await.as_deref(), Some("sk-a"));

        manager.report_error(true).await;
        assert_eq!(manager.get_active_credential().await.as_deref(), Some("sk-b"));
        assert_eq!(manager.active_index().await, Some(1));
    }

    #[tokio::test]
    async fn test_pool_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aeroview.db");

        {
            let store = SqliteCredentialStore::new(Database::open(&path).unwrap());
            let mut record = store.insert("sk-persist").await.unwrap();
            record.is_active = true;
            record.activated_at = 1234;
            store.update(&record).await.unwrap();
        }

        let store = SqliteCredentialStore::new(Database::open(&path).unwrap());
        let active = store.get_active().await.unwrap().unwrap();
        assert_eq!(active.secret, "sk-persist");
        assert_eq!(active.activated_at, 1234);
    }
}
