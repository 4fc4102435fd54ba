//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量加载器与限流器的指标收集功能。

use dashmap::DashMap;
use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// 指标收集器
///
/// 用于收集和存储运行时指标
#[derive(Clone, Debug)]
pub struct Metrics {
    enabled: Arc<AtomicBool>,
    /// 加载器计数
    /// key: "loader:event"（batch / key / failure / cache_hit）
    pub loader_total: Arc<DashMap<String, u64>>,
    /// 限流决策计数
    /// key: "role:result"（admitted / limited）
    pub rate_limit_total: Arc<DashMap<String, u64>>,
    /// 后台清理移除的身份数
    pub sweep_removed_total: Arc<DashMap<String, u64>>,
    /// 当前被跟踪的身份数
    pub tracked_identities: Arc<AtomicUsize>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
            loader_total: Arc::new(DashMap::new()),
            rate_limit_total: Arc::new(DashMap::new()),
            sweep_removed_total: Arc::new(DashMap::new()),
            tracked_identities: Arc::new(AtomicUsize::new(0)),
        }
    }
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

impl Metrics {
    /// 开启或关闭指标记录
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// 记录加载器事件
    ///
    /// # 参数
    ///
    /// * `loader` - 加载器名称
    /// * `event` - 事件类型（batch/key/failure/cache_hit）
    /// * `count` - 增量
    pub fn record_loader(&self, loader: &str, event: &str, count: u64) {
        if !self.is_enabled() {
            return;
        }
        let key = format!("{}:{}", loader, event);
        *self.loader_total.entry(key).or_insert(0) += count;
    }

    /// 记录一次限流决策
    pub fn record_rate_limit(&self, role: &str, limited: bool) {
        if !self.is_enabled() {
            return;
        }
        let result = if limited { "limited" } else { "admitted" };
        let key = format!("{}:{}", role, result);
        *self.rate_limit_total.entry(key).or_insert(0) += 1;
    }

    /// 记录后台清理结果
    pub fn record_sweep(&self, removed: usize, tracked: usize) {
        if !self.is_enabled() {
            return;
        }
        *self
            .sweep_removed_total
            .entry("rate_limiter".to_string())
            .or_insert(0) += removed as u64;
        self.tracked_identities.store(tracked, Ordering::Relaxed);
    }

    /// 设置当前跟踪的身份数
    pub fn set_tracked_identities(&self, tracked: usize) {
        if !self.is_enabled() {
            return;
        }
        self.tracked_identities.store(tracked, Ordering::Relaxed);
    }

    /// 读取加载器计数，不存在时为0
    pub fn loader_count(&self, loader: &str, event: &str) -> u64 {
        self.loader_total
            .get(&format!("{}:{}", loader, event))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// 读取限流计数，不存在时为0
    pub fn rate_limit_count(&self, role: &str, limited: bool) -> u64 {
        let result = if limited { "limited" } else { "admitted" };
        self.rate_limit_total
            .get(&format!("{}:{}", role, result))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// 清空所有指标（仅用于测试）
    #[doc(hidden)]
    pub fn reset(&self) {
        self.loader_total.clear();
        self.rate_limit_total.clear();
        self.sweep_removed_total.clear();
        self.tracked_identities.store(0, Ordering::Relaxed);
    }
}

/// 获取指标字符串
///
/// 将所有指标格式化为 Prometheus 文本格式，用于监控系统采集
pub fn get_metrics_string() -> String {
    let metrics = &GLOBAL_METRICS;
    let mut output = String::new();

    for entry in metrics.loader_total.iter() {
        let parts: Vec<&str> = entry.key().splitn(2, ':').collect();
        if parts.len() == 2 {
            output.push_str(&format!(
                "kinderkit_loader_events_total{{loader=\"{}\", event=\"{}\"}} {}\n",
                parts[0],
                parts[1],
                entry.value()
            ));
        }
    }
    for entry in metrics.rate_limit_total.iter() {
        let parts: Vec<&str> = entry.key().splitn(2, ':').collect();
        if parts.len() == 2 {
            output.push_str(&format!(
                "kinderkit_rate_limit_decisions_total{{role=\"{}\", result=\"{}\"}} {}\n",
                parts[0],
                parts[1],
                entry.value()
            ));
        }
    }
    for entry in metrics.sweep_removed_total.iter() {
        output.push_str(&format!(
            "kinderkit_sweep_removed_total{{component=\"{}\"}} {}\n",
            entry.key(),
            entry.value()
        ));
    }
    output.push_str(&format!(
        "kinderkit_rate_limit_tracked_identities {}\n",
        metrics.tracked_identities.load(Ordering::Relaxed)
    ));
    output
}
