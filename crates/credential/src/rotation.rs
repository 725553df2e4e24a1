//! 凭证轮换策略
//!
//! 纯内存决策：给定池快照和当前活跃位置，回答"下一个该激活谁"。
//! 所有决策以返回值表达，由管理器在单一锁内统一落实
//! （存储写入 + 预算重置），策略本身不产生副作用。
//!
//! 错误轮换只向前推进、到末位即停，不回绕到 0 —— 回绕会让
//! 两把耗尽的密钥互相打转；整池耗尽是调用方必须面对的终态。

use aeroview_core::ApiKeyRecord;

/// 一天的毫秒数
const DAY_MS: i64 = 86_400_000;

/// 添加凭证被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddReject {
    /// 密钥为空白
    Blank,
    /// 密钥已存在
    Duplicate,
    /// 池已达容量上限
    PoolFull,
}

/// 凭证轮换策略
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    /// 激活有效期（毫秒）
    expiry_ms: i64,
}

impl RotationPolicy {
    pub fn new(expiry_days: i64) -> Self {
        Self {
            expiry_ms: expiry_days * DAY_MS,
        }
    }

    /// 活跃凭证是否已到期（到期无条件回退到位置 0）
    ///
    /// 不参考错误计数和预算状态；位置 0 自身再旧也照样回退。
    pub fn expiry_due(&self, active: &ApiKeyRecord, now_ms: i64) -> bool {
        active.activated_at > 0 && active.active_age_ms(now_ms) >= self.expiry_ms
    }

    /// 错误上报后的下一个活跃位置
    ///
    /// 有后继则前移一位；已在末位返回 `None`，原地吸收错误，
    /// 由调用方把这一情况呈现为"凭证已全部耗尽"。
    pub fn next_on_error(&self, pool_len: usize, active_index: usize) -> Option<usize> {
        if active_index + 1 < pool_len {
            Some(active_index + 1)
        } else {
            None
        }
    }

    /// 移除凭证后需要激活的位置
    ///
    /// 被移除的是活跃凭证且池非空时回到位置 0；否则无需变动。
    pub fn after_remove(&self, remaining_len: usize, removed_was_active: bool) -> Option<usize> {
        if removed_was_active && remaining_len > 0 {
            Some(0)
        } else {
            None
        }
    }

    /// 校验添加请求（空白、重复、容量上限）
    pub fn validate_add(
        &self,
        pool: &[ApiKeyRecord],
        secret: &str,
        max_keys: usize,
    ) -> Result<(), AddReject> {
        if secret.trim().is_empty() {
            return Err(AddReject::Blank);
        }
        if pool.len() >= max_keys {
            return Err(AddReject::PoolFull);
        }
        if pool.iter().any(|k| k.secret == secret) {
            return Err(AddReject::Duplicate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, secret: &str, activated_at: i64) -> ApiKeyRecord {
        ApiKeyRecord {
            id,
            secret: secret.to_string(),
            is_active: false,
            activated_at,
            error_count: 0,
            last_used_at: 0,
            created_at: activated_at,
        }
    }

    #[test]
    fn test_expiry_due_after_35_days() {
        let policy = RotationPolicy::new(35);
        let now = 1_700_000_000_000;

        let fresh = record(1, "a", now - 34 * DAY_MS);
        assert!(!policy.expiry_due(&fresh, now));

        let stale = record(1, "a", now - 35 * DAY_MS);
        assert!(policy.expiry_due(&stale, now));

        // 从未激活的凭证不会触发到期
        let never = record(1, "a", 0);
        assert!(!policy.expiry_due(&never, now));
    }

    #[test]
    fn test_error_rotation_is_forward_only() {
        let policy = RotationPolicy::new(35);

        assert_eq!(policy.next_on_error(3, 0), Some(1));
        assert_eq!(policy.next_on_error(3, 1), Some(2));
        // 末位不回绕
        assert_eq!(policy.next_on_error(3, 2), None);
        assert_eq!(policy.next_on_error(1, 0), None);
    }

    #[test]
    fn test_after_remove() {
        let policy = RotationPolicy::new(35);

        assert_eq!(policy.after_remove(2, true), Some(0));
        assert_eq!(policy.after_remove(0, true), None);
        assert_eq!(policy.after_remove(2, false), None);
    }

    #[test]
    fn test_validate_add() {
        let policy = RotationPolicy::new(35);
        let pool = vec![record(1, "sk-a", 0), record(2, "sk-b", 0)];

        assert_eq!(policy.validate_add(&pool, "sk-c", 5), Ok(()));
        assert_eq!(policy.validate_add(&pool, "  ", 5), Err(AddReject::Blank));
        assert_eq!(
            policy.validate_add(&pool, "sk-a", 5),
            Err(AddReject::Duplicate)
        );
        assert_eq!(
            policy.validate_add(&pool, "sk-c", 2),
            Err(AddReject::PoolFull)
        );
    }
}
