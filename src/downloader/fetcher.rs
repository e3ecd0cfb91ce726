use crate::downloader::{OutputSink, Segment, SegmentError};
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 下载单个分片
///
/// 发送携带 `Range: bytes=start-end` 的 GET 请求，流式读取响应体，
/// 每个数据块写入输出文件的 `segment.start + 已写字节数` 处，偏移单调推进，
/// 整个过程不会把响应体整体载入内存。
///
/// 可接受的源站响应：
/// - 206 Partial Content：响应体即为请求的区间
/// - 200 OK：源站不支持 Range，返回完整资源，此时只保留属于本分片的字节
///
/// 其他状态码返回 [`SegmentError::UnexpectedStatus`]。
/// 流结束后实际写入字节数必须等于规划宽度，否则返回
/// [`SegmentError::LengthMismatch`]，避免静默截断。
///
/// 本函数不做任何内部重试，重试策略由协调器决定。
///
/// # 参数
/// * `progress` - 进度回调，参数为本次新写入的字节数
pub async fn fetch_segment<F>(
    client: &Client,
    url: &str,
    segment: Segment,
    sink: &OutputSink,
    timeout: Duration,
    cancel: &CancellationToken,
    progress: F,
) -> Result<u64, SegmentError>
where
    F: Fn(u64) + Send + Sync,
{
    if cancel.is_cancelled() {
        return Err(SegmentError::Cancelled);
    }

    debug!(
        "分片 #{}: 请求 bytes={}-{}, timeout={}s",
        segment.index,
        segment.start,
        segment.end,
        timeout.as_secs()
    );

    let resp = client
        .get(url)
        .header(
            reqwest::header::RANGE,
            format!("bytes={}-{}", segment.start, segment.end),
        )
        .timeout(timeout)
        .send()
        .await?;

    // 206 = 恰好是请求的区间；200 = 源站忽略 Range，返回完整内容
    let full_body = match resp.status().as_u16() {
        206 => false,
        200 => true,
        code => return Err(SegmentError::UnexpectedStatus(code)),
    };

    if full_body {
        warn!(
            "分片 #{}: 源站不支持 Range（返回 200），只保留 [{} - {}] 区间的字节",
            segment.index, segment.start, segment.end
        );
    }

    let width = segment.size();
    // 200 响应时需要先丢弃本分片起点之前的字节
    let mut skip = if full_body { segment.start } else { 0 };
    let mut written: u64 = 0;

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(SegmentError::Cancelled);
        }

        let mut data = chunk?;

        if skip > 0 {
            let n = skip.min(data.len() as u64);
            data = data.slice(n as usize..);
            skip -= n;
            if data.is_empty() {
                continue;
            }
        }

        if written + data.len() as u64 > width {
            if full_body {
                // 完整响应里本分片之后的字节不属于我们
                data.truncate((width - written) as usize);
            } else {
                // 206 却多发了字节，视为源站行为异常
                return Err(SegmentError::LengthMismatch {
                    expected: width,
                    actual: written + data.len() as u64,
                });
            }
        }

        let len = data.len() as u64;
        sink.write_at(segment.start + written, data).await?;
        written += len;
        progress(len);

        if full_body && written == width {
            // 本分片已取满，不再读取剩余响应体
            break;
        }
    }

    // 防止静默截断：实际写入必须等于规划宽度
    if written != width {
        return Err(SegmentError::LengthMismatch {
            expected: width,
            actual: written,
        });
    }

    debug!("分片 #{}: 下载完成, {} bytes", segment.index, written);
    Ok(written)
}
