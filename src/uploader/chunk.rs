// 上传分片管理
//
// 钉钉分片上传规则：
// - 分片数 = ceil(文件大小 / 分片大小)，空文件没有分片
// - 每个分片通过 NDPartition 头声明字节范围: bytes={起始}-{结束}，结束位置包含在内
// - 最后一个分片的结束位置为 文件大小 - 1

use anyhow::{Context, Result};
use std::ops::Range;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

/// 默认上传分片大小: 1MB
pub const DEFAULT_UPLOAD_CHUNK_SIZE: u64 = 1024 * 1024;

/// 上传分片信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk {
    /// 分片索引
    pub index: usize,
    /// 字节范围（左闭右开）
    pub range: Range<u64>,
}

impl UploadChunk {
    pub fn new(index: usize, range: Range<u64>) -> Self {
        Self { index, range }
    }

    /// 分片大小
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }

    /// NDPartition 请求头的值
    pub fn nd_partition(&self) -> String {
        format!("bytes={}-{}", self.range.start, self.range.end - 1)
    }

    /// 读取分片数据
    pub async fn read_data(&self, file_path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(file_path).await.context("打开上传文件失败")?;

        file.seek(std::io::SeekFrom::Start(self.range.start))
            .await
            .context("文件定位失败")?;

        let mut buffer = vec![0u8; self.size() as usize];
        file.read_exact(&mut buffer)
            .await
            .with_context(|| format!("读取分片 #{} 数据失败", self.index))?;

        debug!(
            "读取分片 #{}: {}, 大小={} bytes",
            self.index,
            self.nd_partition(),
            buffer.len()
        );

        Ok(buffer)
    }
}

/// 分片上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Pending,
    Completed,
    Failed,
}

/// 上传分片管理器
#[derive(Debug)]
pub struct UploadChunkManager {
    /// 所有分片
    chunks: Vec<UploadChunk>,
    /// 每个分片的上传结果
    status: Vec<ChunkStatus>,
    /// 文件总大小
    total_size: u64,
    /// 分片大小
    chunk_size: u64,
}

impl UploadChunkManager {
    /// 创建新的上传分片管理器
    ///
    /// `chunk_size` 为 0 时返回错误
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            anyhow::bail!("分片大小必须大于 0");
        }

        let chunks = Self::calculate_chunks(total_size, chunk_size);
        let status = vec![ChunkStatus::Pending; chunks.len()];

        info!(
            "创建上传分片管理器: 文件大小={} bytes, 分片大小={} bytes, 分片数量={}",
            total_size,
            chunk_size,
            chunks.len()
        );

        Ok(Self {
            chunks,
            status,
            total_size,
            chunk_size,
        })
    }

    /// 分片数量: ceil(total_size / chunk_size)
    pub fn chunk_count_for(total_size: u64, chunk_size: u64) -> usize {
        total_size.div_ceil(chunk_size) as usize
    }

    /// 计算分片
    fn calculate_chunks(total_size: u64, chunk_size: u64) -> Vec<UploadChunk> {
        (0..Self::chunk_count_for(total_size, chunk_size))
            .map(|index| {
                let start = index as u64 * chunk_size;
                let end = std::cmp::min(start + chunk_size, total_size);
                UploadChunk::new(index, start..end)
            })
            .collect()
    }

    /// 获取所有分片
    pub fn chunks(&self) -> &[UploadChunk] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// 是否为最后一个分片
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.chunks.len()
    }

    /// 标记分片上传成功
    pub fn mark_completed(&mut self, index: usize) {
        if let Some(s) = self.status.get_mut(index) {
            *s = ChunkStatus::Completed;
        }
    }

    /// 标记分片上传失败
    pub fn mark_failed(&mut self, index: usize) {
        if let Some(s) = self.status.get_mut(index) {
            *s = ChunkStatus::Failed;
        }
    }

    pub fn status(&self, index: usize) -> Option<ChunkStatus> {
        self.status.get(index).copied()
    }

    /// 已完成的分片数量
    pub fn completed_count(&self) -> usize {
        self.status
            .iter()
            .filter(|s| **s == ChunkStatus::Completed)
            .count()
    }

    /// 上传失败的分片索引
    pub fn failed_indices(&self) -> Vec<usize> {
        self.status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ChunkStatus::Failed)
            .map(|(i, _)| i)
            .collect()
    }

    /// 已上传的字节数
    pub fn uploaded_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .zip(&self.status)
            .filter(|(_, s)| **s == ChunkStatus::Completed)
            .map(|(c, _)| c.size())
            .sum()
    }

    /// 上传进度（百分比）
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        (self.uploaded_bytes() as f64 / self.total_size as f64) * 100.0
    }

    /// 是否全部成功
    pub fn is_completed(&self) -> bool {
        self.status.iter().all(|s| *s == ChunkStatus::Completed)
    }
}
