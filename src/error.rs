//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量加载器与限流器共用的错误类型。

use std::sync::Arc;
use thiserror::Error;

/// 错误类型枚举
///
/// 实现了 `Clone`，同一批次失败时可以把同一个错误原样分发给该批次的每个请求方
#[derive(Error, Debug, Clone)]
pub enum KinderError {
    /// 批量获取函数执行失败
    #[error("Batch function failed: {0}")]
    BatchFn(String),

    /// 批量获取函数返回的结果数量与键数量不一致
    #[error("Batch function returned {actual} values for {expected} keys")]
    BatchLengthMismatch { expected: usize, actual: usize },

    /// 等待中的请求在批次执行前被丢弃
    #[error("Pending request was canceled before its batch completed")]
    Canceled,

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 关闭错误
    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(Arc<std::io::Error>),
}

impl From<std::io::Error> for KinderError {
    fn from(e: std::io::Error) -> Self {
        KinderError::IoError(Arc::new(e))
    }
}

impl From<toml::de::Error> for KinderError {
    fn from(e: toml::de::Error) -> Self {
        KinderError::ConfigError(e.to_string())
    }
}

/// 操作结果类型别名
pub type Result<T> = std::result::Result<T, KinderError>;
