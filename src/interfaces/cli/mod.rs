/// CLI Interface Module
///
/// Command-line entry point for running the order service as a standalone
/// process.
///
/// ## Responsibilities
/// - Parse command-line arguments
/// - Initialize logging
/// - Start the service runtime and HTTP/WebSocket server
/// - Handle graceful shutdown on Ctrl-C

use crate::domain::validation::ValidationConfig;
use crate::runtime::{ServerError, ServiceConfig, ServiceRuntime};
use clap::Parser;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// 订单服务命令行配置
#[derive(Parser, Debug, Clone)]
#[command(name = "order-stream")]
#[command(version)]
#[command(about = "订单生命周期管理与实时推送服务", long_about = None)]
pub struct CliConfig {
    /// 服务器监听地址
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// 服务器监听端口
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// 模拟成交延迟（毫秒）
    #[arg(short = 'f', long, default_value_t = 2000)]
    pub fill_latency_ms: u64,

    /// 事件总线通道容量
    #[arg(short = 'c', long, default_value_t = 1024)]
    pub bus_capacity: usize,

    /// 启动模拟行情推送
    #[arg(long, default_value_t = false)]
    pub simulate_ticks: bool,

    /// 模拟行情间隔（毫秒，至少为 1）
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_interval_ms: u64,

    /// 模拟行情合约列表
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "RELIANCE,TCS,INFY,HDFCBANK,ICICIBANK"
    )]
    pub tick_symbols: Vec<String>,

    /// 单笔订单最大数量（不设置则不限制）
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_quantity: Option<u64>,

    /// 允许交易的合约列表（为空则不限制）
    #[arg(long, value_delimiter = ',')]
    pub allowed_symbols: Vec<String>,

    /// 日志级别
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// 仅显示配置不启动服务器（用于调试）
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl From<&CliConfig> for ServiceConfig {
    fn from(cli: &CliConfig) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            fill_latency: Duration::from_millis(cli.fill_latency_ms),
            bus_capacity: cli.bus_capacity,
            simulate_ticks: cli.simulate_ticks,
            tick_interval: Duration::from_millis(cli.tick_interval_ms),
            tick_symbols: cli.tick_symbols.clone(),
            validation: ValidationConfig {
                max_quantity: cli.max_quantity.unwrap_or(u64::MAX),
                allowed_symbols: cli
                    .allowed_symbols
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(Arc::from)
                    .collect(),
            },
        }
    }
}

/// Runs the CLI application
///
/// Parses command-line arguments, starts the service and serves until
/// Ctrl-C.
pub async fn run() -> Result<(), ServerError> {
    let config = CliConfig::parse();

    init_logging(&config.log_level);

    tracing::info!("订单服务启动");
    tracing::info!("配置: {:?}", config);

    println!("========================================");
    println!("  订单生命周期与实时推送服务 v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!("监听地址:     {}:{}", config.host, config.port);
    println!("成交延迟:     {} ms", config.fill_latency_ms);
    println!("总线容量:     {}", config.bus_capacity);
    println!(
        "模拟行情:     {}",
        if config.simulate_ticks {
            format!("启用 ({} ms, {})", config.tick_interval_ms, config.tick_symbols.join(","))
        } else {
            "禁用".to_string()
        }
    );
    println!(
        "数量上限:     {}",
        config
            .max_quantity
            .map_or_else(|| "不限".to_string(), |q| q.to_string())
    );
    println!(
        "允许合约:     {}",
        if config.allowed_symbols.is_empty() {
            "不限".to_string()
        } else {
            config.allowed_symbols.join(",")
        }
    );
    println!("日志级别:     {}", config.log_level);
    println!("========================================");

    if config.dry_run {
        println!("\nDry-run 模式 - 不启动服务器");
        return Ok(());
    }

    let runtime = ServiceRuntime::start(ServiceConfig::from(&config)).await?;
    let listener = match runtime.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            runtime.shutdown().await;
            return Err(e);
        }
    };

    runtime.serve(listener, shutdown_signal()).await?;
    tracing::info!("订单服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        // 无法监听信号时保持运行
        std::future::pending::<()>().await;
    }
    tracing::info!("收到关闭信号");
}

/// 初始化日志系统
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
