// fastget - 多线程分片下载工具核心库

// 配置管理模块
pub mod config;

// 日志系统模块
pub mod logging;

// 下载引擎模块
pub mod downloader;

// 导出常用类型
pub use config::{AppConfig, DownloadConfig, LogConfig};
pub use downloader::{
    fetch_segment, plan_segments, probe_size, DownloadEngine, DownloadError, DownloadJob,
    DownloadReport, OutputSink, Segment, SegmentError, SegmentOutcome,
};
