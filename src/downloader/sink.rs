use crate::downloader::{DownloadError, SegmentError};
use bytes::Bytes;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// 输出文件
///
/// 创建时即预分配到最终大小，之后只接受按绝对偏移寻址的定位写入。
/// 不持有任何共享游标，各分片的写入区间两两不相交，因此可以从多个
/// 任务并发调用 [`write_at`](OutputSink::write_at) 而无需加锁
#[derive(Debug, Clone)]
pub struct OutputSink {
    file: Arc<File>,
    path: PathBuf,
    len: u64,
}

impl OutputSink {
    /// 创建输出文件并预分配空间
    ///
    /// 已存在的文件会被截断。文件系统错误（权限、磁盘空间、路径非法）
    /// 返回 [`DownloadError::SinkCreate`]
    pub async fn create(path: &Path, len: u64) -> Result<Self, DownloadError> {
        let file = tokio::fs::File::create(path).await.map_err(|e| {
            DownloadError::SinkCreate {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        file.set_len(len).await.map_err(|e| DownloadError::SinkCreate {
            path: path.to_path_buf(),
            source: e,
        })?;

        // 定位写入走同步句柄（pwrite），转回 std File
        let file = file.into_std().await;

        info!("文件准备完成: {:?}, 大小: {} bytes", path, len);

        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
            len,
        })
    }

    /// 在绝对偏移处写入整个缓冲区
    ///
    /// 每次调用独立寻址，不依赖也不推进任何共享位置；短写在内部补齐，
    /// 补不齐时返回 [`SegmentError::SinkWrite`]。
    /// 阻塞的系统调用移出异步运行时执行
    pub async fn write_at(&self, offset: u64, data: Bytes) -> Result<(), SegmentError> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || write_all_at(&file, offset, &data))
            .await
            .map_err(|e| {
                SegmentError::SinkWrite(io::Error::new(io::ErrorKind::Other, e))
            })??;
        Ok(())
    }

    /// 将已写入的数据落盘
    pub async fn flush(&self) -> io::Result<()> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || file.sync_all())
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    /// 输出文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 预分配的文件大小
    pub fn len(&self) -> u64 {
        self.len
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, offset: u64, data: &[u8]) -> Result<(), SegmentError> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)?;
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, offset: u64, data: &[u8]) -> Result<(), SegmentError> {
    use std::os::windows::fs::FileExt;
    let mut offset = offset;
    let mut data = data;
    while !data.is_empty() {
        let n = file.seek_write(data, offset)?;
        if n == 0 {
            return Err(SegmentError::SinkWrite(io::Error::new(
                io::ErrorKind::WriteZero,
                "写入返回 0 字节",
            )));
        }
        data = &data[n..];
        offset += n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_preallocates_exact_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");

        let sink = OutputSink::create(&path, 1000).await.unwrap();
        assert_eq!(sink.len(), 1000);

        let metadata = std::fs::metadata(&path).unwrap();
        assert_eq!(metadata.len(), 1000);

        // 预分配区域全部为零
        let content = std::fs::read(&path).unwrap();
        assert!(content.iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_write_at_lands_at_offset() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");

        let sink = OutputSink::create(&path, 10).await.unwrap();
        sink.write_at(4, Bytes::from_static(b"ab")).await.unwrap();
        sink.flush().await.unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content, vec![0, 0, 0, 0, b'a', b'b', 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_writes_do_not_share_cursor() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");

        // 乱序写入互不相交的区间，结果与顺序写入一致
        let sink = OutputSink::create(&path, 6).await.unwrap();
        sink.write_at(4, Bytes::from_static(b"ef")).await.unwrap();
        sink.write_at(0, Bytes::from_static(b"ab")).await.unwrap();
        sink.write_at(2, Bytes::from_static(b"cd")).await.unwrap();
        sink.flush().await.unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content, b"abcdef");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_disjoint_writes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");

        let total: usize = 64 * 1024;
        let parts = 8;
        let width = total / parts;
        let sink = OutputSink::create(&path, total as u64).await.unwrap();

        // N 个任务并发写入各自的区间，完成顺序任意
        let mut handles = Vec::new();
        for i in 0..parts {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                let data: Vec<u8> = (0..width).map(|j| ((i * 7 + j) % 256) as u8).collect();
                sink.write_at((i * width) as u64, Bytes::from(data))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        sink.flush().await.unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.len(), total);
        for i in 0..parts {
            for j in 0..width {
                assert_eq!(content[i * width + j], ((i * 7 + j) % 256) as u8);
            }
        }
    }

    #[tokio::test]
    async fn test_create_invalid_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("no_such_dir").join("out.bin");

        let result = OutputSink::create(&path, 100).await;
        assert!(matches!(result, Err(DownloadError::SinkCreate { .. })));
    }
}
