//! kinderkit - 请求处理工具层
//!
//! 为幼儿园管理平台后端提供两个相互独立的进程内组件：
//! 合并单键查询的批量加载器，以及按角色配额的滑动窗口限流器。

#![doc(html_root_url = "https://docs.rs/kinderkit/0.1.0")]

pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod manager;
pub mod metrics;
pub mod rate_limiting;
pub mod telemetry;

// Re-export commonly used items
pub use config::{Config, LoaderConfig, RateLimitConfig, RoleLimit};
pub use error::{KinderError, Result};
pub use loader::{batch_fn, BatchFn, BatchLoader};
pub use manager::ServiceContext;
pub use rate_limiting::{
    Clock, ManualClock, RateLimitDecision, RateLimiterStats, SystemClock, WindowedRateLimiter,
};

/// kinderkit 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
