//! 滑动窗口速率预算跟踪
//!
//! 在本地近似远端供应商的速率限制，避免把请求浪费在
//! 必然被拒绝的调用上。本地预算只是保守估计，
//! 真正的限流以供应商服务端为准。

use aeroview_core::{RateLimitConfig, UsageStats};

/// 分钟窗口长度（毫秒）
const MINUTE_MS: i64 = 60_000;
/// 天窗口长度（毫秒）
const DAY_MS: i64 = 86_400_000;

/// 单凭证速率预算跟踪器
///
/// 记录分钟/天两个滑动窗口内的请求时间戳和分钟 token 用量。
/// 状态仅存在于进程生命周期内，不落盘；凭证每次激活时整体重置。
///
/// 所有方法显式接收 `now_ms`，由调用方（管理器）在每次操作开始
/// 时取一次时钟，窗口测试因此无需真实等待。
pub struct RateLimitTracker {
    config: RateLimitConfig,
    /// 分钟窗口内的请求时间戳
    minute_requests: Vec<i64>,
    /// 天窗口内的请求时间戳
    day_requests: Vec<i64>,
    /// 分钟窗口内的 token 计数
    token_count: u64,
    last_minute_reset: i64,
    last_day_reset: i64,
}

impl RateLimitTracker {
    pub fn new(config: RateLimitConfig, now_ms: i64) -> Self {
        Self {
            config,
            minute_requests: Vec::new(),
            day_requests: Vec::new(),
            token_count: 0,
            last_minute_reset: now_ms,
            last_day_reset: now_ms,
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// 检查当前是否允许发起一次请求（无副作用）
    ///
    /// 先清理过期窗口，再依次检查 RPM、TPM、RPD 三个上限。
    pub fn can_make_request(&mut self, now_ms: i64, estimated_tokens: u32) -> bool {
        self.cleanup_old_requests(now_ms);

        if self.minute_requests.len() >= self.config.rpm as usize {
            return false;
        }

        if self.token_count + estimated_tokens as u64 > self.config.tpm as u64 {
            return false;
        }

        if self.day_requests.len() >= self.config.rpd as usize {
            return false;
        }

        true
    }

    /// 记录一次已实际发出的请求
    ///
    /// 无论远端成败都计入本地预算；每次真实请求恰好调用一次。
    pub fn record_request(&mut self, now_ms: i64, tokens_used: u32) {
        self.minute_requests.push(now_ms);
        self.day_requests.push(now_ms);
        self.token_count += tokens_used as u64;
    }

    /// 当前用量快照（触发与检查相同的窗口清理）
    pub fn usage_stats(&mut self, now_ms: i64) -> UsageStats {
        self.cleanup_old_requests(now_ms);
        UsageStats {
            requests_this_minute: self.minute_requests.len() as u32,
            requests_today: self.day_requests.len() as u32,
            tokens_this_minute: self.token_count,
            rpm_limit: self.config.rpm,
            rpd_limit: self.config.rpd,
            tpm_limit: self.config.tpm,
        }
    }

    /// 清空全部窗口和计数；凭证（重新）激活时调用
    pub fn reset(&mut self, now_ms: i64) {
        self.minute_requests.clear();
        self.day_requests.clear();
        self.token_count = 0;
        self.last_minute_reset = now_ms;
        self.last_day_reset = now_ms;
    }

    fn cleanup_old_requests(&mut self, now_ms: i64) {
        // 粗粒度翻窗：整分钟过去后清空分钟日志和 token 计数
        if now_ms - self.last_minute_reset >= MINUTE_MS {
            self.minute_requests.clear();
            self.token_count = 0;
            self.last_minute_reset = now_ms;
        }

        if now_ms - self.last_day_reset >= DAY_MS {
            self.day_requests.clear();
            self.last_day_reset = now_ms;
        }

        // 细粒度滑动：翻窗之间逐条淘汰过期时间戳
        self.minute_requests.retain(|t| now_ms - t <= MINUTE_MS);
        self.day_requests.retain(|t| now_ms - t <= DAY_MS);
    }
}
