//! 速率限制与管理器配置
//!
//! 配额上限为启动时读取的静态配置，运行期不可变。

use crate::types::ModelTier;
use serde::{Deserialize, Serialize};

/// 单档位速率限制配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 每分钟最大请求数
    pub rpm: u32,
    /// 每分钟最大 token 数
    pub tpm: u32,
    /// 每天最大请求数
    pub rpd: u32,
}

impl RateLimitConfig {
    /// Flash 档位限额
    pub const FLASH: RateLimitConfig = RateLimitConfig {
        rpm: 8,
        tpm: 238_999,
        rpd: 239,
    };

    /// Pro 档位限额
    pub const PRO: RateLimitConfig = RateLimitConfig {
        rpm: 1,
        tpm: 123_999,
        rpd: 42,
    };

    /// 按模型档位查表
    pub fn for_tier(tier: ModelTier) -> RateLimitConfig {
        match tier {
            ModelTier::Flash => RateLimitConfig::FLASH,
            ModelTier::Pro => RateLimitConfig::PRO,
        }
    }
}

/// 凭证管理器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// 凭证池容量上限
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    /// 凭证激活有效期（天），到期强制回退到首个凭证
    #[serde(default = "default_expiry_days")]
    pub expiry_days: i64,
    /// 调用方无法预估用量时的默认 token 估计值
    #[serde(default = "default_estimated_tokens")]
    pub default_estimated_tokens: u32,
}

fn default_max_keys() -> usize {
    5
}
fn default_expiry_days() -> i64 {
    35
}
fn default_estimated_tokens() -> u32 {
    1000
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_keys: 5,
            expiry_days: 35,
            default_estimated_tokens: 1000,
        }
    }
}

/// 当前用量统计
///
/// 用于 UI 展示和遥测，由速率限制器快照产生。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// 本分钟窗口内的请求数
    pub requests_this_minute: u32,
    /// 本天窗口内的请求数
    pub requests_today: u32,
    /// 本分钟窗口内的 token 数
    pub tokens_this_minute: u64,
    /// RPM 上限
    pub rpm_limit: u32,
    /// RPD 上限
    pub rpd_limit: u32,
    /// TPM 上限
    pub tpm_limit: u32,
}

impl UsageStats {
    pub fn rpm_percentage(&self) -> f32 {
        percentage(self.requests_this_minute as f64, self.rpm_limit as f64)
    }

    pub fn rpd_percentage(&self) -> f32 {
        percentage(self.requests_today as f64, self.rpd_limit as f64)
    }

    pub fn tpm_percentage(&self) -> f32 {
        percentage(self.tokens_this_minute as f64, self.tpm_limit as f64)
    }

    /// 任一维度用量超过 80%
    pub fn is_near_limit(&self) -> bool {
        self.rpm_percentage() > 80.0
            || self.rpd_percentage() > 80.0
            || self.tpm_percentage() > 80.0
    }

    /// 任一维度已达上限
    pub fn is_at_limit(&self) -> bool {
        self.requests_this_minute >= self.rpm_limit
            || self.requests_today >= self.rpd_limit
            || self.tokens_this_minute >= self.tpm_limit as u64
    }
}

fn percentage(used: f64, limit: f64) -> f32 {
    if limit <= 0.0 {
        0.0
    } else {
        ((used / limit) * 100.0) as f32
    }
}
