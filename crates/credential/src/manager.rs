//! 统一凭证管理器
//!
//! 组合速率预算跟踪、轮换策略和存储适配器，
//! 是 AI 请求层访问凭证子系统的唯一入口。
//!
//! ## 并发模型
//!
//! 全部公开操作通过单个 `tokio::sync::Mutex` 串行化：
//! 激活（先全部取消再激活一个）相对其他激活路径是原子的，
//! `can_make_request` 到 `record_request` 之间也不会有并发调用
//! 在同一份预算上重复放行。预算跟踪器按凭证 id 常驻内存，
//! 进程退出即消失；请求在通过检查后被取消会造成本地少计，
//! 以供应商服务端限流兜底。

use crate::rotation::RotationPolicy;
use crate::store::CredentialStore;
use crate::tracker::RateLimitTracker;
use aeroview_core::{now_ms, ApiKeyRecord, ManagerConfig, ModelTier, RateLimitConfig, UsageStats};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// 统一凭证管理器
///
/// 显式构造、显式持有，生命周期跟随应用会话，不提供全局单例。
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    config: ManagerConfig,
    policy: RotationPolicy,
    state: Mutex<ManagerState>,
    stats_tx: watch::Sender<Option<UsageStats>>,
}

struct ManagerState {
    /// 预算跟踪器，按凭证 id 索引（不按密钥字符串）
    trackers: HashMap<i64, RateLimitTracker>,
    /// 当前模型档位，决定新建跟踪器的限额
    tier: ModelTier,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, config: ManagerConfig) -> Self {
        let (stats_tx, _) = watch::channel(None);
        Self {
            store,
            policy: RotationPolicy::new(config.expiry_days),
            config,
            state: Mutex::new(ManagerState {
                trackers: HashMap::new(),
                tier: ModelTier::default(),
            }),
            stats_tx,
        }
    }

    /// 获取当前可用的凭证密钥
    ///
    /// 先做到期检查（满有效期则回退到首个凭证并重置其预算），
    /// 池为空时返回 `None`。
    pub async fn get_active_credential(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        let now = now_ms();
        self.fetch_active(&mut state, now)
            .await
            .map(|record| record.secret)
    }

    /// 检查当前凭证能否发起一次请求，必要时自动切换
    ///
    /// `estimated_tokens` 为 `None` 时使用配置的默认估计值。
    /// 本地预算被拒视作限流信号：轮换一次后在新凭证上重查一次，
    /// 仍不行则放弃（不无限重试）。
    pub async fn can_make_request(&self, estimated_tokens: Option<u32>) -> bool {
        let est = estimated_tokens.unwrap_or(self.config.default_estimated_tokens);
        let mut state = self.state.lock().await;
        let now = now_ms();

        let Some(active) = self.fetch_active(&mut state, now).await else {
            return false;
        };

        let tier = state.tier;
        if Self::tracker_for(&mut state.trackers, tier, active.id, now).can_make_request(now, est)
        {
            return true;
        }

        warn!(key_id = active.id, "本地速率预算超限，尝试切换凭证");
        self.report_error_locked(&mut state, true, now).await;

        let Some(next) = self.fetch_active(&mut state, now).await else {
            return false;
        };
        Self::tracker_for(&mut state.trackers, tier, next.id, now).can_make_request(now, est)
    }

    /// 记录一次已实际发出的请求
    pub async fn record_request(&self, tokens_used: u32) {
        let mut state = self.state.lock().await;
        let now = now_ms();

        let Some(active) = self.fetch_active(&mut state, now).await else {
            return;
        };

        let tier = state.tier;
        let tracker = Self::tracker_for(&mut state.trackers, tier, active.id, now);
        tracker.record_request(now, tokens_used);
        let stats = tracker.usage_stats(now);
        let _ = self.stats_tx.send(Some(stats));

        let used = ApiKeyRecord {
            last_used_at: now,
            ..active
        };
        if let Err(e) = self.store.update(&used).await {
            warn!(error = %e, "更新最后使用时间失败");
        }
    }

    /// 上报一次失败的调用，触发向后轮换
    ///
    /// `is_rate_limit` 目前仅用于日志，不影响轮换决策。
    pub async fn report_error(&self, is_rate_limit: bool) {
        let mut state = self.state.lock().await;
        let now = now_ms();
        self.report_error_locked(&mut state, is_rate_limit, now).await;
    }

    /// 手动选择某个位置的凭证
    ///
    /// 重选当前活跃位置同样会重置其预算（强制刷新）。
    pub async fn set_manual_credential(&self, index: usize) -> bool {
        let mut state = self.state.lock().await;
        let now = now_ms();

        let Some(pool) = self.list_or_log().await else {
            return false;
        };
        let Some(target) = pool.get(index) else {
            warn!(index, "手动选择的凭证位置无效");
            return false;
        };

        match self.activate(&mut state, target, now).await {
            Ok(_) => {
                info!(index, key_id = target.id, "手动切换凭证");
                true
            }
            Err(e) => {
                warn!(error = %e, "手动切换凭证失败");
                false
            }
        }
    }

    /// 添加一条新凭证，返回是否成功
    ///
    /// 空白密钥、重复密钥、池满（默认 5 条）均拒绝；
    /// 首条凭证添加后立即激活。
    pub async fn add_credential(&self, secret: &str) -> bool {
        let mut state = self.state.lock().await;
        let now = now_ms();

        let Some(pool) = self.list_or_log().await else {
            return false;
        };
        if let Err(reject) = self.policy.validate_add(&pool, secret, self.config.max_keys) {
            warn!(reason = ?reject, "拒绝添加凭证");
            return false;
        }

        let record = match self.store.insert(secret).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "插入凭证失败");
                return false;
            }
        };

        if pool.is_empty() {
            if let Err(e) = self.activate(&mut state, &record, now).await {
                warn!(error = %e, "激活首条凭证失败");
                return false;
            }
        }

        info!(key_id = record.id, "凭证已添加");
        true
    }

    /// 按位置移除一条凭证，返回位置是否有效
    ///
    /// 移除的是活跃凭证时激活剩余池的首个凭证。
    pub async fn remove_credential(&self, index: usize) -> bool {
        let mut state = self.state.lock().await;
        let now = now_ms();

        let Some(pool) = self.list_or_log().await else {
            return false;
        };
        let Some(target) = pool.get(index) else {
            return false;
        };
        let was_active = target.is_active;
        let target_id = target.id;

        if let Err(e) = self.store.delete(target_id).await {
            warn!(error = %e, "删除凭证失败");
            return false;
        }
        state.trackers.remove(&target_id);

        if self.policy.after_remove(pool.len() - 1, was_active).is_some() {
            if let Some(remaining) = self.list_or_log().await {
                if let Some(first) = remaining.first() {
                    if let Err(e) = self.activate(&mut state, first, now).await {
                        warn!(error = %e, "移除后激活首个凭证失败");
                    }
                }
            }
        }

        info!(key_id = target_id, "凭证已移除");
        true
    }

    /// 按池顺序列出全部凭证
    pub async fn list_credentials(&self) -> Vec<ApiKeyRecord> {
        self.list_or_log().await.unwrap_or_default()
    }

    /// 当前活跃凭证在池中的位置
    pub async fn active_index(&self) -> Option<usize> {
        let pool = self.list_or_log().await?;
        pool.iter().position(|r| r.is_active)
    }

    /// 是否已配置任何凭证
    pub async fn has_credentials(&self) -> bool {
        !self.list_credentials().await.is_empty()
    }

    /// 切换模型档位
    ///
    /// 只影响之后新建（或重置后新建）的跟踪器限额；
    /// 已有跟踪器保留原限额直到下一次激活重置。
    pub async fn switch_tier(&self, tier: ModelTier) {
        let mut state = self.state.lock().await;
        state.tier = tier;
        info!(tier = tier.as_str(), "切换模型档位");
    }

    /// 当前活跃凭证的用量快照
    pub async fn usage_stats(&self) -> Option<UsageStats> {
        let mut state = self.state.lock().await;
        let now = now_ms();
        let active = self.fetch_active(&mut state, now).await?;
        let tier = state.tier;
        Some(Self::tracker_for(&mut state.trackers, tier, active.id, now).usage_stats(now))
    }

    /// 订阅用量统计（每次准入/记录后推送）
    pub fn subscribe_usage(&self) -> watch::Receiver<Option<UsageStats>> {
        self.stats_tx.subscribe()
    }

    /// 解析活跃凭证并执行到期检查
    ///
    /// 到期时无条件回退到位置 0 并重置其预算。
    async fn fetch_active(
        &self,
        state: &mut ManagerState,
        now: i64,
    ) -> Option<ApiKeyRecord> {
        let active = match self.store.get_active().await {
            Ok(v) => v?,
            Err(e) => {
                warn!(error = %e, "读取活跃凭证失败");
                return None;
            }
        };

        let active = if self.policy.expiry_due(&active, now) {
            info!(key_id = active.id, "凭证激活已满有效期，回退到首个凭证");
            let pool = self.list_or_log().await?;
            let first = pool.first()?.clone();
            match self.activate(state, &first, now).await {
                Ok(activated) => activated,
                Err(e) => {
                    warn!(error = %e, "到期回退失败");
                    return None;
                }
            }
        } else {
            active
        };

        let tier = state.tier;
        let stats =
            Self::tracker_for(&mut state.trackers, tier, active.id, now).usage_stats(now);
        let _ = self.stats_tx.send(Some(stats));

        Some(active)
    }

    /// 激活一条凭证：先全部取消，再激活目标并重置其预算
    ///
    /// 错误计数清零、激活时间刷新；调用方持有状态锁，
    /// 对外不可观察到两条同时活跃的中间态。
    async fn activate(
        &self,
        state: &mut ManagerState,
        record: &ApiKeyRecord,
        now: i64,
    ) -> Result<ApiKeyRecord, aeroview_core::StoreError> {
        self.store.deactivate_all().await?;
        let activated = ApiKeyRecord {
            is_active: true,
            activated_at: now,
            error_count: 0,
            ..record.clone()
        };
        self.store.update(&activated).await?;

        let tier = state.tier;
        Self::tracker_for(&mut state.trackers, tier, activated.id, now).reset(now);
        debug!(key_id = activated.id, "凭证已激活，预算已重置");
        Ok(activated)
    }

    /// 错误上报的轮换路径：错误计数 +1，有后继则前移一位
    async fn report_error_locked(&self, state: &mut ManagerState, is_rate_limit: bool, now: i64) {
        let current = match self.store.get_active().await {
            Ok(Some(r)) => r,
            Ok(None) => {
                warn!("无活跃凭证，忽略错误上报");
                return;
            }
            Err(e) => {
                warn!(error = %e, "读取活跃凭证失败");
                return;
            }
        };

        warn!(key_id = current.id, is_rate_limit, "凭证调用失败");

        let bumped = ApiKeyRecord {
            error_count: current.error_count + 1,
            ..current.clone()
        };
        if let Err(e) = self.store.update(&bumped).await {
            warn!(error = %e, "更新错误计数失败");
            return;
        }

        let Some(pool) = self.list_or_log().await else {
            return;
        };
        let Some(index) = pool.iter().position(|r| r.id == current.id) else {
            return;
        };

        match self.policy.next_on_error(pool.len(), index) {
            Some(next) => {
                info!(from = index, to = next, "切换到下一个凭证");
                if let Err(e) = self.activate(state, &pool[next], now).await {
                    warn!(error = %e, "切换凭证失败");
                }
            }
            None => {
                // 末位凭证原地吸收错误，调用方据空结果提示用户补充密钥
                warn!(key_id = current.id, "已到池末位，凭证全部耗尽");
            }
        }
    }

    async fn list_or_log(&self) -> Option<Vec<ApiKeyRecord>> {
        match self.store.list().await {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "读取凭证池失败");
                None
            }
        }
    }

    fn tracker_for<'a>(
        trackers: &'a mut HashMap<i64, RateLimitTracker>,
        tier: ModelTier,
        id: i64,
        now: i64,
    ) -> &'a mut RateLimitTracker {
        trackers
            .entry(id)
            .or_insert_with(|| RateLimitTracker::new(RateLimitConfig::for_tier(tier), now))
    }
}
