//! 登录失败锁定规则

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::value_objects::Timestamp;

/// 每个账户的失败计数和锁定截止时间
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: Option<Timestamp>,
}

/// 连续失败 `max_failed_attempts` 次后锁定 `lockout_seconds` 秒。
/// `max_failed_attempts == 0` 表示关闭锁定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lockout_seconds: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_seconds: 300,
        }
    }
}

impl LockoutPolicy {
    pub fn disabled() -> Self {
        Self {
            max_failed_attempts: 0,
            lockout_seconds: 0,
        }
    }

    pub fn is_locked(&self, state: &LockoutState, now: Timestamp) -> bool {
        matches!(state.locked_until, Some(until) if until > now)
    }

    pub fn record_failure(&self, state: &LockoutState, now: Timestamp) -> LockoutState {
        if self.max_failed_attempts == 0 {
            return LockoutState::default();
        }
        // 锁定期间的失败不改变状态，锁定不会被提前解除
        if self.is_locked(state, now) {
            return state.clone();
        }
        // 锁定已过期的账户从零开始计数
        let previous = if state.locked_until.is_some() {
            0
        } else {
            state.failed_attempts
        };
        let failed_attempts = previous + 1;
        if failed_attempts >= self.max_failed_attempts {
            LockoutState {
                failed_attempts: 0,
                locked_until: Some(now + Duration::seconds(self.lockout_seconds)),
            }
        } else {
            LockoutState {
                failed_attempts,
                locked_until: None,
            }
        }
    }

    pub fn record_success(&self) -> LockoutState {
        LockoutState::default()
    }
}
