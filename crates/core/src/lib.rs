//! AeroView 核心类型 crate
//!
//! 定义凭证子系统的共享类型：凭证记录、模型档位、
//! 速率限制配置、用量统计和存储错误。
//!
//! ## 模块结构
//!
//! - `types` - 凭证记录和模型档位
//! - `config` - 速率限制和管理器配置
//! - `error` - 存储层错误类型

mod config;
mod error;
mod types;

pub use config::{ManagerConfig, RateLimitConfig, UsageStats};
pub use error::StoreError;
pub use types::{ApiKeyRecord, ModelTier};

/// 当前 epoch 毫秒时间戳
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
