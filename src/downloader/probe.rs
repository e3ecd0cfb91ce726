use crate::downloader::DownloadError;
use reqwest::Client;
use tracing::debug;

/// 探测资源大小
///
/// 向源站发送 HEAD 请求并解析 Content-Length。
/// 源站不可达、状态码非 2xx 或缺少可用的长度指示时返回
/// [`DownloadError::SizeUnavailable`]，整个任务随之中止，没有部分回退
pub async fn probe_size(client: &Client, url: &str) -> Result<u64, DownloadError> {
    let resp = client.head(url).send().await.map_err(|e| {
        DownloadError::SizeUnavailable {
            url: url.to_string(),
            reason: format!("HEAD 请求失败: {}", e),
        }
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(DownloadError::SizeUnavailable {
            url: url.to_string(),
            reason: format!("源站返回 {}", status),
        });
    }

    let size = resp
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| DownloadError::SizeUnavailable {
            url: url.to_string(),
            reason: "响应缺少 Content-Length".to_string(),
        })?;

    debug!("探测完成: {} → {} bytes", url, size);
    Ok(size)
}
