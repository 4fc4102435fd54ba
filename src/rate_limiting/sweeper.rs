//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了限流器的后台清理任务。

use super::{Clock, WindowedRateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

impl<C: Clock> WindowedRateLimiter<C> {
    /// 启动后台清理任务
    ///
    /// 每隔 `period` 调用一次 [`sweep`](Self::sweep)，直到 `cancel` 被取消
    ///
    /// # 参数
    ///
    /// * `period` - 清理间隔
    /// * `cancel` - 取消令牌
    ///
    /// # 返回值
    ///
    /// 返回后台任务句柄
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            info!("限流清理任务已启动，间隔 {:?}", period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("限流清理任务已停止");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = self.sweep();
                        trace!("限流清理移除 {} 个身份", removed);
                    }
                }
            }
        })
    }
}
