//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了基于滑动窗口的按身份限流，配额由调用方角色决定。

pub mod clock;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};

use crate::config::{RateLimitConfig, RoleLimit, ANONYMOUS};
use crate::error::{KinderError, Result};
use crate::metrics::GLOBAL_METRICS;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 单次限流检查的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// 是否被限流
    pub limited: bool,
    /// 窗口内允许的最大请求数
    pub limit: u32,
    /// 窗口内剩余可用次数
    pub remaining: u32,
    /// 被限流时建议的重试等待秒数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    /// 放行时窗口重置的 Unix 秒
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_epoch_seconds: Option<i64>,
}

impl RateLimitDecision {
    /// 转换为 HTTP 响应头
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
        ];
        if let Some(reset) = self.reset_epoch_seconds {
            headers.push(("X-RateLimit-Reset", reset.to_string()));
        }
        if let Some(retry_after) = self.retry_after_seconds {
            headers.push(("Retry-After", retry_after.to_string()));
        }
        headers
    }
}

/// 限流器统计信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    /// 当前被跟踪的身份数
    pub tracked_identity_count: usize,
    /// 角色配额表
    pub limits: BTreeMap<String, RoleLimit>,
}

/// 滑动窗口限流器
///
/// 为每个身份维护请求时间戳队列。每次检查先剔除窗口外的时间戳再判断数量，
/// 被拒绝的请求不记录；[`sweep`](Self::sweep) 按固定回看时长回收闲置身份。
pub struct WindowedRateLimiter<C = SystemClock> {
    limits: HashMap<String, RoleLimit>,
    logs: DashMap<String, VecDeque<i64>, ahash::RandomState>,
    retention_ms: i64,
    sweep_interval: Duration,
    clock: C,
}

impl<C> std::fmt::Debug for WindowedRateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedRateLimiter")
            .field("limits", &self.limits)
            .field("tracked", &self.logs.len())
            .field("retention_ms", &self.retention_ms)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl WindowedRateLimiter<SystemClock> {
    /// 使用系统时钟创建限流器
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> WindowedRateLimiter<C> {
    /// 使用指定时钟创建限流器
    ///
    /// # 返回值
    ///
    /// 配额表缺少 `anonymous` 或配额无效时返回 `ConfigError`
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Result<Self> {
        config.validate().map_err(KinderError::ConfigError)?;
        Ok(Self {
            limits: config.roles,
            logs: DashMap::with_hasher(ahash::RandomState::new()),
            retention_ms: (config.retention_secs as i64).saturating_mul(1000),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            clock,
        })
    }

    /// 检查并记录一次请求
    ///
    /// 身份为空时视为 `anonymous`，角色缺失或未知时使用 `anonymous` 配额。
    /// 剔除、判断与追加在同一身份的条目锁内完成。
    ///
    /// # 返回值
    ///
    /// 被限流时不记录本次请求，`retry_after_seconds` 由窗口内最早的时间戳计算
    #[instrument(skip(self), level = "debug")]
    pub fn check_and_record(&self, identity: Option<&str>, role: Option<&str>) -> RateLimitDecision {
        let identity = resolve_identity(identity);
        let (role, limit) = self.resolve_role(role);
        let window_ms = i64::try_from(limit.window_ms).unwrap_or(i64::MAX);
        let max_requests = limit.max_requests as usize;
        let now = self.clock.now_millis();

        let mut inserted = false;
        let decision = {
            let mut log = match self.logs.entry(identity.to_string()) {
                Entry::Occupied(entry) => entry.into_ref(),
                Entry::Vacant(entry) => {
                    inserted = true;
                    entry.insert(VecDeque::new())
                }
            };
            prune(&mut log, now, window_ms);

            if log.len() >= max_requests {
                let oldest = log.front().copied().unwrap_or(now);
                let wait_ms = oldest.saturating_add(window_ms).saturating_sub(now).max(0);
                RateLimitDecision {
                    limited: true,
                    limit: limit.max_requests,
                    remaining: 0,
                    retry_after_seconds: Some(ceil_secs(wait_ms) as u64),
                    reset_epoch_seconds: None,
                }
            } else {
                log.push_back(now);
                RateLimitDecision {
                    limited: false,
                    limit: limit.max_requests,
                    remaining: limit.max_requests.saturating_sub(log.len() as u32),
                    retry_after_seconds: None,
                    reset_epoch_seconds: Some(ceil_secs(now.saturating_add(window_ms))),
                }
            }
        };

        // 条目锁已释放，此时统计总数不会与其他分片死锁
        if inserted {
            GLOBAL_METRICS.set_tracked_identities(self.logs.len());
        }
        GLOBAL_METRICS.record_rate_limit(role, decision.limited);
        if decision.limited {
            warn!(
                "身份 {} (角色 {}) 超出限流，{} 秒后重试",
                identity,
                role,
                decision.retry_after_seconds.unwrap_or_default()
            );
        }
        decision
    }

    /// 清除某个身份的全部记录，之后立即可以再次请求
    #[instrument(skip(self), level = "debug")]
    pub fn reset(&self, identity: &str) {
        let identity = resolve_identity(Some(identity));
        if self.logs.remove(identity).is_some() {
            GLOBAL_METRICS.set_tracked_identities(self.logs.len());
            debug!("已重置身份 {} 的限流记录", identity);
        }
    }

    /// 清理闲置身份
    ///
    /// 将每个身份的记录裁剪到固定回看时长内（与角色窗口无关），
    /// 并移除裁剪后为空的身份。回看时长内有记录的身份不会被移除。
    ///
    /// # 返回值
    ///
    /// 返回被移除的身份数
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let retention_ms = self.retention_ms;
        let mut removed = 0;
        self.logs.retain(|_, log| {
            prune(log, now, retention_ms);
            if log.is_empty() {
                removed += 1;
                false
            } else {
                true
            }
        });

        let tracked = self.logs.len();
        GLOBAL_METRICS.record_sweep(removed, tracked);
        debug!("限流清理完成: 移除 {} 个身份, 剩余 {}", removed, tracked);
        removed
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> RateLimiterStats {
        let tracked_identity_count = self.logs.len();
        GLOBAL_METRICS.set_tracked_identities(tracked_identity_count);
        RateLimiterStats {
            tracked_identity_count,
            limits: self
                .limits
                .iter()
                .map(|(name, limit)| (name.clone(), *limit))
                .collect(),
        }
    }

    /// 获取角色对应的配额，缺失或未知时为 `anonymous` 配额
    pub fn limit_for(&self, role: Option<&str>) -> RoleLimit {
        self.resolve_role(role).1
    }

    /// 配置的后台清理间隔
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    fn resolve_role<'a>(&'a self, role: Option<&'a str>) -> (&'a str, RoleLimit) {
        if let Some(name) = role {
            if let Some(limit) = self.limits.get(name) {
                return (name, *limit);
            }
        }
        let limit = self
            .limits
            .get(ANONYMOUS)
            .copied()
            .unwrap_or_else(|| RoleLimit::new(60_000, 30));
        (ANONYMOUS, limit)
    }
}

fn resolve_identity(identity: Option<&str>) -> &str {
    match identity {
        Some(id) if !id.is_empty() => id,
        _ => ANONYMOUS,
    }
}

/// 从队首剔除存在时间达到 `window_ms` 的时间戳
fn prune(log: &mut VecDeque<i64>, now: i64, window_ms: i64) {
    while let Some(&oldest) = log.front() {
        if now.saturating_sub(oldest) >= window_ms {
            log.pop_front();
        } else {
            break;
        }
    }
}

#[inline]
fn ceil_secs(millis: i64) -> i64 {
    millis.saturating_add(999).div_euclid(1000)
}
