//! 凭证存储适配器
//!
//! 定义凭证池的持久化契约。管理器只通过这个 trait 访问存储，
//! 具体实现（SQLite 版在 infra crate）留给外层。
//! 插入顺序即池顺序；`update` 为整条记录替换。

use aeroview_core::{now_ms, ApiKeyRecord, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;

/// 凭证存储契约
///
/// 这是凭证子系统中唯一允许挂起的边界；
/// 预算计算和轮换决策都是同步的纯内存操作。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 按池顺序（id 升序）列出全部凭证
    async fn list(&self) -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// 获取当前活跃凭证
    async fn get_active(&self) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// 插入新凭证（初始未激活），返回带 id 的完整记录
    async fn insert(&self, secret: &str) -> Result<ApiKeyRecord, StoreError>;

    /// 整条替换一条已有记录
    async fn update(&self, record: &ApiKeyRecord) -> Result<(), StoreError>;

    /// 取消所有凭证的活跃标记
    async fn deactivate_all(&self) -> Result<(), StoreError>;

    /// 删除一条凭证，返回是否存在
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

/// 内存凭证存储
///
/// 用于测试和无持久化场景，行为与 SQLite 实现一致。
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    records: Vec<ApiKeyRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn list(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        Ok(self.inner.lock().records.clone())
    }

    async fn get_active(&self) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .records
            .iter()
            .find(|r| r.is_active)
            .cloned())
    }

    async fn insert(&self, secret: &str) -> Result<ApiKeyRecord, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let record = ApiKeyRecord {
            id: inner.next_id,
            secret: secret.to_string(),
            is_active: false,
            activated_at: 0,
            error_count: 0,
            last_used_at: 0,
            created_at: now_ms(),
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        match inner.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::InvalidRecord(format!(
                "凭证 {} 不存在",
                record.id
            ))),
        }
    }

    async fn deactivate_all(&self) -> Result<(), StoreError> {
        for r in self.inner.lock().records.iter_mut() {
            r.is_active = false;
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        inner.records.retain(|r| r.id != id);
        Ok(inner.records.len() < before)
    }
}
