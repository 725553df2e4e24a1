//! 类型定义
//!
//! 定义凭证子系统的核心类型。

use serde::{Deserialize, Serialize};

/// API 凭证记录
///
/// 凭证池按 `id` 升序排列（插入顺序即池顺序）。
/// 任意时刻至多一条记录 `is_active = true`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// 凭证 ID（自增，决定池内顺序）
    pub id: i64,
    /// 密钥字符串
    pub secret: String,
    /// 是否为当前活跃凭证
    pub is_active: bool,
    /// 激活时间（epoch 毫秒，0 表示从未激活）
    pub activated_at: i64,
    /// 自上次激活以来的连续错误次数
    pub error_count: u32,
    /// 最后使用时间（epoch 毫秒，0 表示从未使用）
    pub last_used_at: i64,
    /// 创建时间（epoch 毫秒）
    pub created_at: i64,
}

impl ApiKeyRecord {
    /// 凭证已激活的时长（毫秒）
    pub fn active_age_ms(&self, now_ms: i64) -> i64 {
        if self.activated_at <= 0 {
            0
        } else {
            now_ms.saturating_sub(self.activated_at)
        }
    }
}

/// 模型档位
///
/// 决定新建速率限制器使用的配额上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// 快速档（高 RPM、高 RPD）
    Flash,
    /// 重型档（低 RPM、低 RPD）
    Pro,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Flash => "flash",
            ModelTier::Pro => "pro",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pro" | "heavy" => ModelTier::Pro,
            _ => ModelTier::Flash,
        }
    }
}

impl Default for ModelTier {
    fn default() -> Self {
        ModelTier::Flash
    }
}
