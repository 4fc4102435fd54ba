//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "kinderkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "limits", about = "Show the effective role limit table")]
    Limits(LimitsArgs),

    #[command(name = "simulate", about = "Replay a request burst against a fresh rate limiter")]
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
pub struct LimitsArgs {
    #[arg(short, long, help = "Output in JSON format")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    #[arg(short, long, help = "Caller identity (empty means anonymous)")]
    pub identity: Option<String>,

    #[arg(short, long, help = "Caller role")]
    pub role: Option<String>,

    #[arg(short = 'n', long, default_value_t = 10, help = "Number of requests")]
    pub requests: u32,

    #[arg(long, default_value_t = 0, help = "Simulated milliseconds between requests")]
    pub interval_ms: u64,

    #[arg(short, long, help = "Output decisions in JSON format")]
    pub json: bool,

    #[arg(short, long, help = "Print collected metrics afterwards")]
    pub metrics: bool,
}

mod limits;
mod simulate;

/// 加载配置，未指定路径时使用默认配置
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
        None => Config::default(),
    };
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;
    Ok(config)
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    crate::telemetry::init_tracing(&config.global.log_level);

    match &cli.command {
        Commands::Limits(args) => limits::execute(&config, args).await,
        Commands::Simulate(args) => simulate::execute(&config, args).await,
    }
}
