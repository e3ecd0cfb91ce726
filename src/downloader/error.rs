// 下载模块错误类型定义

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 任务级错误
///
/// 发生后整个任务中止，不会启动任何分片下载
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 无法获取资源大小（源站不可达、状态码异常或缺少 Content-Length）
    #[error("无法获取资源大小: {url}: {reason}")]
    SizeUnavailable { url: String, reason: String },

    /// 创建输出文件失败（权限、磁盘空间、路径非法）
    #[error("创建输出文件失败: {path:?}: {source}")]
    SinkCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 配置无效
    #[error("配置无效: {0}")]
    InvalidConfig(String),
}

/// 分片级错误
///
/// 只影响单个分片，由协调器收集后汇总上报，不会中断其他分片
#[derive(Debug, Error)]
pub enum SegmentError {
    /// 源站返回了既不是 206 也不是 200 的状态码
    #[error("源站返回意外状态码: {0}")]
    UnexpectedStatus(u16),

    /// 网络错误（请求发送失败、响应流读取失败、超时）
    #[error("网络错误: {0}")]
    Network(#[from] reqwest::Error),

    /// 写入输出文件失败
    ///
    /// 本地磁盘问题会影响所有分片，协调器收到后会取消剩余分片
    #[error("写入输出文件失败: {0}")]
    SinkWrite(#[from] io::Error),

    /// 分片实际字节数与规划宽度不符（源站截断或多发）
    #[error("分片字节数不匹配: 期望 {expected} bytes, 实际 {actual} bytes")]
    LengthMismatch { expected: u64, actual: u64 },

    /// 分片下载已被取消
    #[error("分片下载已被取消")]
    Cancelled,
}

impl SegmentError {
    /// 是否属于值得重试的瞬时错误
    ///
    /// 网络错误和截断可能是瞬时的；状态码异常、本地写入失败和取消不重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SegmentError::Network(_) | SegmentError::LengthMismatch { .. }
        )
    }
}
