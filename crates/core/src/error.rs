//! 存储层错误类型

use thiserror::Error;

/// 凭证存储错误
///
/// 仅用于存储适配器边界；池空、预算超限、凭证耗尽等
/// 预期状态以 `Option`/`bool` 返回值表达，不走错误通道。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 底层数据库错误
    #[error("数据库错误: {0}")]
    Database(String),

    /// 记录字段无法解析
    #[error("无效的凭证记录: {0}")]
    InvalidRecord(String),
}
