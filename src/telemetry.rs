//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志初始化功能。

use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 初始化 tracing 日志
///
/// 此函数应该在应用程序启动时调用，重复调用不会产生副作用。
/// 设置了 RUST_LOG 环境变量时以环境变量为准，否则使用 `default_level`。
///
/// # 参数
///
/// * `default_level` - 默认日志级别（例如 "info"、"debug"）
pub fn init_tracing(default_level: &str) {
    let default_level = default_level.to_string();
    INIT.call_once(move || {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level));

        // 可能已被应用层设置过全局 subscriber，这里忽略该错误
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .ok();
    });
}
