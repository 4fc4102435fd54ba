//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了配额表查询命令的实现。

use crate::cli::LimitsArgs;
use crate::config::Config;
use crate::rate_limiting::WindowedRateLimiter;
use anyhow::Result;

pub async fn execute(config: &Config, args: &LimitsArgs) -> Result<()> {
    let limiter = WindowedRateLimiter::new(config.rate_limit.clone())?;
    let stats = limiter.get_stats();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("=== Rate Limit Roles ===\n");
    println!("{:<16} {:>12} {:>14}", "ROLE", "WINDOW (ms)", "MAX REQUESTS");
    for (role, limit) in &stats.limits {
        println!(
            "{:<16} {:>12} {:>14}",
            role, limit.window_ms, limit.max_requests
        );
    }

    println!("\nSweep interval: {}s", config.rate_limit.sweep_interval_secs);
    println!("Sweep retention: {}s", config.rate_limit.retention_secs);
    println!(
        "\nLoader: max_batch_size={}, batch_delay_ms={}, cache_enabled={}",
        config.loader.max_batch_size, config.loader.batch_delay_ms, config.loader.cache_enabled
    );

    Ok(())
}
