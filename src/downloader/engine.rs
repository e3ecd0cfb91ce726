use crate::config::DownloadConfig;
use crate::downloader::{
    fetch_segment, plan_segments, probe_size, DownloadError, DownloadJob, DownloadReport,
    OutputSink, Segment, SegmentError, SegmentOutcome,
};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 下载引擎
///
/// 任务的唯一协调者：探测大小 → 创建输出文件 → 规划分片 →
/// 并发启动分片下载 → 等待全部分片到达终态 → 汇总报告。
/// 其余组件都是纯函数或窄接口服务，由引擎调用
pub struct DownloadEngine {
    client: Client,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl DownloadEngine {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        config.validate()?;

        let client = Client::builder()
            .build()
            .map_err(|e| DownloadError::InvalidConfig(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// 取消令牌
    ///
    /// 调用方（如 CLI 的 Ctrl+C 处理）触发后，仍在运行的分片会尽快停止
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 执行下载任务
    ///
    /// 任务级失败（探测失败、创建文件失败）返回 Err，探测失败时不会留下
    /// 任何输出文件。分片级失败不会中断其他分片，全部分片结束后在报告中
    /// 逐一列出；部分失败时已写入的数据保留，文件不删除，便于将来只补
    /// 失败区间
    pub async fn run(&self, job: &DownloadJob) -> Result<DownloadReport, DownloadError> {
        let started = Instant::now();
        let started_at = chrono::Utc::now().timestamp();

        // 1. 探测资源大小（失败则整个任务中止，不创建任何文件）
        let total_size = probe_size(&self.client, &job.url).await?;
        info!("📦 资源大小: {} bytes", total_size);

        // 2. 创建输出文件并预分配到最终大小
        let sink = OutputSink::create(&job.output_path, total_size).await?;

        // 3. 规划分片
        let segments = plan_segments(total_size, job.segment_count);

        // 空资源：无需任何请求，直接成功
        if segments.is_empty() {
            if let Err(e) = sink.flush().await {
                warn!("落盘失败: {}", e);
            }
            return Ok(self.build_report(job, total_size, started, started_at, Vec::new()));
        }

        if segments.len() != job.segment_count {
            info!(
                "资源过小，分片数由 {} 收缩为 {}",
                job.segment_count,
                segments.len()
            );
        }

        // 4. 并发下载所有分片
        let outcomes = self.download_segments(&job.url, &segments, &sink).await;

        if let Err(e) = sink.flush().await {
            warn!("落盘失败: {}", e);
        }

        let report = self.build_report(job, total_size, started, started_at, outcomes);

        if report.succeeded() {
            info!(
                "🎉 下载完成: {:?}, {} bytes, 耗时 {:.2}s, 平均 {:.2} KB/s",
                job.output_path,
                report.bytes_written(),
                report.elapsed_secs,
                report.speed_kbps()
            );
        } else {
            error!(
                "❌ 下载未完成: {}/{} 个分片成功，失败区间保留为零填充",
                report.success_count(),
                report.outcomes.len()
            );
        }

        Ok(report)
    }

    /// 并发下载所有分片
    ///
    /// 所有分片任务立即 spawn（真正的扇出，不等待任何一个完成），
    /// 并发度由 Semaphore 限制为 min(分片数, max_concurrent)，
    /// 默认配置下分片数即并发度，信号量不会造成等待。
    /// 之后逐一 join：这是屏障而不是竞速，最慢的分片结束前任务不算结束
    async fn download_segments(
        &self,
        url: &str,
        segments: &[Segment],
        sink: &OutputSink,
    ) -> Vec<SegmentOutcome> {
        let permits = self.config.max_concurrent.min(segments.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let max_retries = self.config.max_retries;

        info!(
            "开始并发下载 {} 个分片 (并发度 {}, 每请求超时 {}s, 重试上限 {})",
            segments.len(),
            permits,
            timeout.as_secs(),
            max_retries
        );

        let mut handles = Vec::with_capacity(segments.len());
        for segment in segments {
            let segment = *segment;
            let client = self.client.clone();
            let url = url.to_string();
            let sink = sink.clone();
            let cancel = self.cancel.clone();
            let semaphore = semaphore.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => {
                        return SegmentOutcome::failure(
                            &segment,
                            0,
                            SegmentError::Cancelled.to_string(),
                        )
                    }
                };

                Self::run_segment(
                    &client,
                    &url,
                    segment,
                    &sink,
                    timeout,
                    &cancel,
                    max_retries,
                )
                .await
            });

            handles.push(handle);
        }

        // 等待每个分片到达终态（join/屏障）
        let mut outcomes = Vec::with_capacity(handles.len());
        for (segment, handle) in segments.iter().zip(handles) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    // 分片任务 panic，按失败记录，不影响其他分片
                    error!("分片 #{} 任务异常: {}", segment.index, e);
                    outcomes.push(SegmentOutcome::failure(
                        segment,
                        0,
                        format!("分片任务异常: {}", e),
                    ));
                }
            }
        }
        outcomes
    }

    /// 下载单个分片（含协调器级重试）
    ///
    /// 重试只覆盖瞬时错误，每次重试从分片起点重新写起。
    /// max_retries = 0 时保持一次失败即定局的基线行为
    async fn run_segment(
        client: &Client,
        url: &str,
        segment: Segment,
        sink: &OutputSink,
        timeout: Duration,
        cancel: &CancellationToken,
        max_retries: u32,
    ) -> SegmentOutcome {
        let written = Arc::new(AtomicU64::new(0));
        let mut attempt: u32 = 0;

        loop {
            // 每次尝试从分片起点重新写起，进度归零
            written.store(0, Ordering::Relaxed);
            let progress = {
                let written = Arc::clone(&written);
                move |n: u64| {
                    written.fetch_add(n, Ordering::Relaxed);
                }
            };

            match fetch_segment(client, url, segment, sink, timeout, cancel, progress).await {
                Ok(bytes) => {
                    info!(
                        "✅ 分片 #{} 下载完成 [{} - {}], {} bytes",
                        segment.index, segment.start, segment.end, bytes
                    );
                    return SegmentOutcome::success(&segment, bytes);
                }
                Err(err) => {
                    // 本地写入失败说明磁盘已不可用，继续下载其他分片没有意义
                    if matches!(err, SegmentError::SinkWrite(_)) {
                        error!("分片 #{} 写入失败，取消剩余分片: {}", segment.index, err);
                        cancel.cancel();
                    }

                    if err.is_retryable() && attempt < max_retries && !cancel.is_cancelled() {
                        attempt += 1;
                        warn!(
                            "分片 #{} 第 {}/{} 次重试: {}",
                            segment.index, attempt, max_retries, err
                        );
                        tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                        continue;
                    }

                    error!(
                        "❌ 分片 #{} 下载失败 [{} - {}]: {}",
                        segment.index, segment.start, segment.end, err
                    );
                    return SegmentOutcome::failure(
                        &segment,
                        written.load(Ordering::Relaxed),
                        err.to_string(),
                    );
                }
            }
        }
    }

    fn build_report(
        &self,
        job: &DownloadJob,
        total_size: u64,
        started: Instant,
        started_at: i64,
        outcomes: Vec<SegmentOutcome>,
    ) -> DownloadReport {
        DownloadReport {
            url: job.url.clone(),
            output_path: job.output_path.clone(),
            total_size,
            started_at,
            completed_at: chrono::Utc::now().timestamp(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            outcomes,
        }
    }
}
