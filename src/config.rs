//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量加载器与限流器的配置结构和解析逻辑。

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

/// 匿名身份与兜底角色的名称
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// 全局配置
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct GlobalConfig {
    /// 日志级别，RUST_LOG 环境变量优先
    pub log_level: String,
    /// 是否启用指标收集
    pub enable_metrics: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_metrics: true,
        }
    }
}

/// 批量加载器配置
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// 单次批量调用携带的最大键数
    pub max_batch_size: usize,
    /// 合并窗口（毫秒）
    pub batch_delay_ms: u64,
    /// 是否缓存已解析的值
    pub cache_enabled: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            batch_delay_ms: 10,
            cache_enabled: true,
        }
    }
}

/// 单个角色的限流配额
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleLimit {
    /// 滑动窗口长度（毫秒）
    pub window_ms: u64,
    /// 窗口内允许的最大请求数
    pub max_requests: u32,
}

impl RoleLimit {
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }
}

/// 限流配置
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 后台清理间隔（秒）
    pub sweep_interval_secs: u64,
    /// 后台清理时的固定回看时长（秒），与各角色的窗口无关
    pub retention_secs: u64,
    /// 角色 -> 配额表，必须包含 `anonymous`
    pub roles: HashMap<String, RoleLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut roles = HashMap::new();
        roles.insert(ANONYMOUS.to_string(), RoleLimit::new(60_000, 30));
        roles.insert("parent".to_string(), RoleLimit::new(60_000, 100));
        roles.insert("teacher".to_string(), RoleLimit::new(60_000, 200));
        roles.insert("admin".to_string(), RoleLimit::new(60_000, 500));
        Self {
            sweep_interval_secs: 300,
            retention_secs: 300,
            roles,
        }
    }
}

impl RateLimitConfig {
    /// 检查限流配置的有效性
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.sweep_interval_secs == 0 {
            return Err("rate_limit sweep_interval_secs cannot be zero".to_string());
        }

        if self.retention_secs == 0 {
            return Err("rate_limit retention_secs cannot be zero".to_string());
        }

        if !self.roles.contains_key(ANONYMOUS) {
            return Err(format!(
                "rate_limit roles must contain an '{}' entry",
                ANONYMOUS
            ));
        }

        for (name, limit) in &self.roles {
            if name.is_empty() {
                return Err("Role name cannot be empty".to_string());
            }

            if name.len() > 64 {
                return Err(format!(
                    "Role name '{}' exceeds maximum length of 64 characters",
                    name
                ));
            }

            if limit.window_ms == 0 {
                return Err(format!("Role '{}' window_ms cannot be zero", name));
            }

            if limit.max_requests == 0 {
                return Err(format!("Role '{}' max_requests cannot be zero", name));
            }
        }

        Ok(())
    }
}

impl Config {
    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 从 TOML 文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值都在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.loader.max_batch_size == 0 {
            return Err("loader max_batch_size cannot be zero".to_string());
        }

        if self.loader.max_batch_size > 10000 {
            return Err("loader max_batch_size cannot exceed 10000".to_string());
        }

        if self.loader.batch_delay_ms > 60000 {
            return Err("loader batch_delay_ms cannot exceed 60000 ms".to_string());
        }

        self.rate_limit.validate()
    }
}
