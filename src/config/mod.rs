// 配置管理模块

use crate::downloader::DownloadError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 下载配置
    #[serde(default)]
    pub download: DownloadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 加载配置
    ///
    /// 给定路径时从 TOML 文件读取，未给定时使用默认配置。
    /// 指定的文件不存在或解析失败都视为错误，不做静默回退
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let content = tokio::fs::read_to_string(p)
                    .await
                    .with_context(|| format!("读取配置文件失败: {:?}", p))?;
                toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", p))
            }
            None => Ok(Self::default()),
        }
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// 分片数量（并发度与分片数一致）
    #[serde(default = "default_segment_count")]
    pub segment_count: usize,
    /// 单个分片请求的超时时间（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 分片失败后的最大重试次数（0 = 不重试）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 并发上限，防止用户指定超大分片数时耗尽资源
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_segment_count() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    0
}

fn default_max_concurrent() -> usize {
    64
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            segment_count: default_segment_count(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl DownloadConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.segment_count == 0 {
            return Err(DownloadError::InvalidConfig(
                "分片数量必须大于 0".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(DownloadError::InvalidConfig(
                "并发上限必须大于 0".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(DownloadError::InvalidConfig(
                "请求超时必须大于 0 秒".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化（CLI 默认只输出到控制台）
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_download_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.segment_count, 4);
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.max_concurrent, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_segment_count() {
        let config = DownloadConfig {
            segment_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        // 未出现的字段取默认值
        let config: AppConfig = toml::from_str(
            r#"
            [download]
            segment_count = 8
            max_retries = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.download.segment_count, 8);
        assert_eq!(config.download.max_retries, 2);
        assert_eq!(config.download.timeout_secs, 300);
        assert!(!config.log.enabled);
    }

    #[test]
    fn test_parse_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.download.segment_count, 4);
        assert_eq!(config.log.level, "info");
    }
}
