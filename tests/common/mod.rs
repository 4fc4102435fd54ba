//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。

use kinderkit::config::{RateLimitConfig, RoleLimit};
use kinderkit::error::{KinderError, Result};
use kinderkit::loader::BatchFn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 记录每次调用的键列表的批量获取函数
///
/// 返回 `key * 10`；`fail` 为 true 时返回错误
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingBatchFn {
    pub calls: Arc<Mutex<Vec<Vec<u32>>>>,
    pub fail: bool,
}

#[allow(dead_code)]
impl RecordingBatchFn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<u32>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BatchFn<u32, u32> for RecordingBatchFn {
    async fn load(&self, keys: Vec<u32>) -> Result<Vec<u32>> {
        self.calls.lock().unwrap().push(keys.clone());
        if self.fail {
            return Err(KinderError::BatchFn("attendance store unavailable".to_string()));
        }
        Ok(keys.iter().map(|k| k * 10).collect())
    }
}

/// 按给定角色表构造限流配置
#[allow(dead_code)]
pub fn rate_limit_config(roles: &[(&str, u64, u32)]) -> RateLimitConfig {
    let mut map = HashMap::new();
    for (name, window_ms, max_requests) in roles {
        map.insert(name.to_string(), RoleLimit::new(*window_ms, *max_requests));
    }
    RateLimitConfig {
        roles: map,
        ..Default::default()
    }
}
