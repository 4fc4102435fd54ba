//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了服务上下文，负责在启动时构建并持有限流器与批量加载器。

use crate::config::{Config, LoaderConfig};
use crate::error::{KinderError, Result};
use crate::loader::{BatchFn, BatchLoader};
use crate::metrics::GLOBAL_METRICS;
use crate::rate_limiting::{Clock, SystemClock, WindowedRateLimiter};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// 服务上下文
///
/// 应用的组合根：启动时创建一次，按引用传递给请求处理代码
pub struct ServiceContext<C: Clock = SystemClock> {
    config: Config,
    rate_limiter: Arc<WindowedRateLimiter<C>>,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock> std::fmt::Debug for ServiceContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("loader", &self.config.loader)
            .field("rate_limiter", &self.rate_limiter)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ServiceContext<SystemClock> {
    /// 使用系统时钟初始化服务上下文
    ///
    /// 必须在 tokio 运行时内调用
    pub async fn init(config: Config) -> Result<Self> {
        Self::init_with_clock(config, SystemClock).await
    }
}

impl<C: Clock> ServiceContext<C> {
    /// 初始化服务上下文
    ///
    /// 验证配置，构建限流器并启动后台清理任务
    ///
    /// # 参数
    ///
    /// * `config` - 配置
    /// * `clock` - 限流器使用的时钟
    #[instrument(skip(config, clock), level = "info", fields(roles = config.rate_limit.roles.len()))]
    pub async fn init_with_clock(config: Config, clock: C) -> Result<Self> {
        config.validate().map_err(KinderError::ConfigError)?;

        GLOBAL_METRICS.set_enabled(config.global.enable_metrics);

        let rate_limiter = Arc::new(WindowedRateLimiter::with_clock(
            config.rate_limit.clone(),
            clock,
        )?);
        let cancel = CancellationToken::new();
        let sweeper = rate_limiter
            .clone()
            .spawn_sweeper(rate_limiter.sweep_interval(), cancel.child_token());

        info!(
            "ServiceContext 初始化完成: {} 个角色, 批次上限 {}, 合并窗口 {}ms",
            config.rate_limit.roles.len(),
            config.loader.max_batch_size,
            config.loader.batch_delay_ms
        );

        Ok(Self {
            config,
            rate_limiter,
            cancel,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// 获取限流器
    pub fn rate_limiter(&self) -> Arc<WindowedRateLimiter<C>> {
        Arc::clone(&self.rate_limiter)
    }

    /// 使用配置的加载器参数创建批量加载器
    ///
    /// # 参数
    ///
    /// * `name` - 加载器名称，用于日志和指标
    /// * `batch_fn` - 批量获取函数
    pub fn loader<K, V, F>(&self, name: &str, batch_fn: F) -> BatchLoader<K, V, F>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: BatchFn<K, V>,
    {
        BatchLoader::with_name(name, batch_fn, self.config.loader.clone())
    }

    /// 加载器配置
    pub fn loader_config(&self) -> &LoaderConfig {
        &self.config.loader
    }

    /// 完整配置
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 优雅关闭
    ///
    /// 停止后台清理任务并等待其退出，重复调用无副作用
    #[instrument(skip(self), level = "info")]
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        let handle = self.sweeper.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("限流清理任务退出异常: {}", e);
                return Err(KinderError::ShutdownError(format!(
                    "sweeper task failed: {}",
                    e
                )));
            }
        }
        info!("ServiceContext 已关闭");
        Ok(())
    }
}

impl<C: Clock> Drop for ServiceContext<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
