use serde::{Deserialize, Serialize};
use tracing::debug;

/// 分片信息
///
/// 表示资源的一段连续字节区间，`start` 和 `end` 均为闭区间端点。
/// 所有分片恰好覆盖 `[0, length)`：首片从 0 开始，相邻分片首尾相接，
/// 末片结束于 `length - 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 分片索引
    pub index: usize,
    /// 起始字节偏移（含）
    pub start: u64,
    /// 结束字节偏移（含）
    pub end: u64,
}

impl Segment {
    /// 分片大小（字节数）
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// 计算分片规划
///
/// 纯函数：相同输入永远产生相同输出。
/// 算法：`chunk = length / count`（整数除法），第 `i` 片覆盖
/// `[i*chunk, (i+1)*chunk - 1]`，末片吸收整除余数，覆盖到 `length - 1`。
///
/// 小文件策略：`length < count` 时分片数收缩为 `length`（每片 1 字节）；
/// `length == 0` 时返回空规划，由协调器直接生成空文件
pub fn plan_segments(length: u64, segment_count: usize) -> Vec<Segment> {
    if length == 0 {
        return Vec::new();
    }

    // 分片数至少为 1，且不超过总字节数
    let count = (segment_count.max(1) as u64).min(length);
    let chunk = length / count;

    let mut segments = Vec::with_capacity(count as usize);
    for i in 0..count {
        let start = i * chunk;
        let end = if i == count - 1 {
            length - 1 // 末片吸收余数
        } else {
            (i + 1) * chunk - 1
        };
        segments.push(Segment {
            index: i as usize,
            start,
            end,
        });
    }

    debug!(
        "分片规划完成: 总大小={} bytes, 分片数={}, 每片约 {} bytes",
        length,
        segments.len(),
        chunk
    );

    segments
}
