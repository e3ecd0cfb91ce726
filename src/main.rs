use clap::Parser;
use fastget_rust::{
    config::AppConfig, logging, DownloadEngine, DownloadJob, DownloadReport,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 多线程分片下载工具
///
/// 把远程资源按字节区间切分后并发拉取，每个分片直接写入
/// 输出文件中自己的最终位置
#[derive(Parser, Debug)]
#[command(name = "fastget", version, about = "多线程分片下载工具")]
struct Cli {
    /// 资源 URL
    url: String,

    /// 输出文件路径
    output: PathBuf,

    /// 分片数量（默认取配置文件值，缺省 4）
    #[arg(short = 'n', long = "segments")]
    segments: Option<usize>,

    /// 单个分片请求的超时时间（秒）
    #[arg(long)]
    timeout: Option<u64>,

    /// 分片失败后的最大重试次数
    #[arg(long)]
    retries: Option<u32>,

    /// 配置文件路径（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 以 JSON 形式向 stdout 输出下载报告
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置文件，命令行参数覆盖文件中的值
    let mut config = AppConfig::load(cli.config.as_deref()).await?;
    if let Some(n) = cli.segments {
        config.download.segment_count = n;
    }
    if let Some(secs) = cli.timeout {
        config.download.timeout_secs = secs;
    }
    if let Some(retries) = cli.retries {
        config.download.max_retries = retries;
    }

    // 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&config.log);

    info!("fastget v{} 启动", env!("CARGO_PKG_VERSION"));

    let engine = DownloadEngine::new(config.download.clone())?;

    // Ctrl+C 触发取消，仍在运行的分片尽快停止
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到 Ctrl+C，取消剩余分片...");
            cancel.cancel();
        }
    });

    let job = DownloadJob::new(
        cli.url,
        cli.output,
        config.download.segment_count,
    );

    let success = match engine.run(&job).await {
        Ok(report) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            print_summary(&report);
            report.succeeded()
        }
        Err(e) => {
            error!("❌ 下载失败: {}", e);
            false
        }
    };

    // 先释放日志守卫，确保缓冲的日志全部写出
    drop(_log_guard);

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// 输出任务汇总：总分片数、成功数、失败数，以及每个失败分片的区间和原因
fn print_summary(report: &DownloadReport) {
    info!(
        "任务汇总: 共 {} 个分片, 成功 {}, 失败 {}",
        report.outcomes.len(),
        report.success_count(),
        report.outcomes.len() - report.success_count()
    );

    for outcome in report.failed_outcomes() {
        error!(
            "失败分片 #{} [{} - {}]: {}",
            outcome.index,
            outcome.start,
            outcome.end,
            outcome.error.as_deref().unwrap_or("未知原因")
        );
    }
}
