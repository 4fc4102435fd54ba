//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了限流模拟命令的实现。

use crate::cli::SimulateArgs;
use crate::config::Config;
use crate::metrics::get_metrics_string;
use crate::rate_limiting::{Clock, ManualClock, SystemClock, WindowedRateLimiter};
use anyhow::Result;
use std::time::Duration;

pub async fn execute(config: &Config, args: &SimulateArgs) -> Result<()> {
    // 模拟时间从当前墙钟开始，按 interval_ms 推进，无需真实等待
    let clock = ManualClock::new(SystemClock.now_millis());
    let limiter = WindowedRateLimiter::with_clock(config.rate_limit.clone(), clock.clone())?;
    let identity = args.identity.as_deref();
    let role = args.role.as_deref();

    if !args.json {
        println!(
            "=== Simulating {} requests (identity={}, role={}) ===\n",
            args.requests,
            identity.unwrap_or("anonymous"),
            role.unwrap_or("anonymous")
        );
    }

    let mut admitted = 0u32;
    for i in 0..args.requests {
        if i > 0 {
            clock.advance(Duration::from_millis(args.interval_ms));
        }
        let decision = limiter.check_and_record(identity, role);
        if !decision.limited {
            admitted += 1;
        }

        if args.json {
            println!("{}", serde_json::to_string(&decision)?);
        } else if decision.limited {
            println!(
                "#{:<4} LIMITED   remaining={:<4} retry_after={}s",
                i + 1,
                decision.remaining,
                decision.retry_after_seconds.unwrap_or_default()
            );
        } else {
            println!(
                "#{:<4} ADMITTED  remaining={:<4} reset={}",
                i + 1,
                decision.remaining,
                decision.reset_epoch_seconds.unwrap_or_default()
            );
        }
    }

    if !args.json {
        let stats = limiter.get_stats();
        println!(
            "\nAdmitted {} of {} requests, tracked identities: {}",
            admitted, args.requests, stats.tracked_identity_count
        );
    }

    if args.metrics {
        println!("\n{}", get_metrics_string());
    }

    Ok(())
}
