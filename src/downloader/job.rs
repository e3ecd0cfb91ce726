use crate::downloader::Segment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 下载任务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJob {
    /// 资源 URL
    pub url: String,
    /// 本地保存路径
    pub output_path: PathBuf,
    /// 分片数量（并发度与分片数一致）
    pub segment_count: usize,
}

impl DownloadJob {
    pub fn new(url: String, output_path: PathBuf, segment_count: usize) -> Self {
        Self {
            url,
            output_path,
            segment_count,
        }
    }
}

/// 单个分片的最终结果
///
/// 每个分片恰好产生一次，产生后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentOutcome {
    /// 分片索引
    pub index: usize,
    /// 起始字节偏移（含）
    pub start: u64,
    /// 结束字节偏移（含）
    pub end: u64,
    /// 实际写入的字节数
    pub bytes_written: u64,
    /// 失败原因，成功时为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SegmentOutcome {
    /// 记录成功的分片
    pub fn success(segment: &Segment, bytes_written: u64) -> Self {
        Self {
            index: segment.index,
            start: segment.start,
            end: segment.end,
            bytes_written,
            error: None,
        }
    }

    /// 记录失败的分片
    pub fn failure(segment: &Segment, bytes_written: u64, error: String) -> Self {
        Self {
            index: segment.index,
            start: segment.start,
            end: segment.end,
            bytes_written,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 下载报告
///
/// 所有分片到达终态后由协调器汇总产生。任务整体成功当且仅当
/// 每个分片都成功；失败的分片保留索引、字节区间和原因，
/// 已成功分片写入的数据仍然有效
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    /// 资源 URL
    pub url: String,
    /// 本地保存路径
    pub output_path: PathBuf,
    /// 资源总大小
    pub total_size: u64,
    /// 开始时间 (Unix timestamp)
    pub started_at: i64,
    /// 结束时间 (Unix timestamp)
    pub completed_at: i64,
    /// 总耗时（秒）
    pub elapsed_secs: f64,
    /// 各分片结果，按索引排列
    pub outcomes: Vec<SegmentOutcome>,
}

impl DownloadReport {
    /// 任务整体是否成功
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_success())
    }

    /// 成功的分片数量
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// 失败的分片
    pub fn failed_outcomes(&self) -> Vec<&SegmentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    /// 实际写入的总字节数
    pub fn bytes_written(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes_written).sum()
    }

    /// 平均下载速度 (KB/s)
    pub fn speed_kbps(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_written() as f64 / self.elapsed_secs / 1024.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(index: usize, start: u64, end: u64) -> Segment {
        Segment { index, start, end }
    }

    fn report(outcomes: Vec<SegmentOutcome>) -> DownloadReport {
        DownloadReport {
            url: "http://127.0.0.1/file.bin".to_string(),
            output_path: PathBuf::from("./file.bin"),
            total_size: 1000,
            started_at: 0,
            completed_at: 2,
            elapsed_secs: 2.0,
            outcomes,
        }
    }

    #[test]
    fn test_outcome_success() {
        let outcome = SegmentOutcome::success(&segment(1, 250, 499), 250);
        assert!(outcome.is_success());
        assert_eq!(outcome.index, 1);
        assert_eq!(outcome.bytes_written, 250);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_outcome_failure_keeps_range() {
        let outcome =
            SegmentOutcome::failure(&segment(2, 500, 749), 100, "网络错误".to_string());
        assert!(!outcome.is_success());
        assert_eq!((outcome.start, outcome.end), (500, 749));
        assert_eq!(outcome.bytes_written, 100);
    }

    #[test]
    fn test_report_all_success() {
        let r = report(vec![
            SegmentOutcome::success(&segment(0, 0, 499), 500),
            SegmentOutcome::success(&segment(1, 500, 999), 500),
        ]);
        assert!(r.succeeded());
        assert_eq!(r.success_count(), 2);
        assert!(r.failed_outcomes().is_empty());
        assert_eq!(r.bytes_written(), 1000);
        // 1000 bytes / 2s = 500 B/s
        assert!((r.speed_kbps() - 500.0 / 1024.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_partial_failure() {
        let r = report(vec![
            SegmentOutcome::success(&segment(0, 0, 499), 500),
            SegmentOutcome::failure(&segment(1, 500, 999), 0, "网络错误".to_string()),
        ]);
        assert!(!r.succeeded());
        assert_eq!(r.success_count(), 1);
        let failed = r.failed_outcomes();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 1);
    }

    #[test]
    fn test_report_json_roundtrip() {
        let r = report(vec![SegmentOutcome::success(&segment(0, 0, 999), 1000)]);
        let json = serde_json::to_string(&r).unwrap();
        let parsed: DownloadReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.outcomes.len(), 1);
        assert!(parsed.succeeded());
        // 成功分片不序列化 error 字段
        assert!(!json.contains("\"error\""));
    }
}
