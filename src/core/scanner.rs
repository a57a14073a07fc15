use crate::core::metadata::FileMetadataReader;
use crate::error::{Result, ScanError};
use crate::models::{FileRecord, ScanRequest, ScanResult};
use crate::storage::{FileSystem, StorageError, VersionReader};
use glob::Pattern;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 本地扫描器
pub struct LocalScanner {
    fs: Arc<dyn FileSystem>,
    reader: FileMetadataReader,
    max_concurrent: usize,
    deadline: Option<Duration>,
}

impl LocalScanner {
    pub fn new(fs: Arc<dyn FileSystem>, versions: Arc<dyn VersionReader>) -> Self {
        Self {
            reader: FileMetadataReader::new(fs.clone(), versions),
            fs,
            max_concurrent: 8,
            deadline: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// 整个扫描的期限，超时返回 `ScanTimeout`
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// 扫描并包装成结果信封
    pub async fn scan(&self, request: &ScanRequest, cancel: &CancellationToken) -> ScanResult {
        let started = Instant::now();
        info!(
            root = %request.directory,
            pattern = %request.pattern,
            recursive = request.recursive,
            folders = request.folders.len(),
            "开始本地扫描"
        );

        match self.scan_files(request, cancel).await {
            Ok(files) => {
                let elapsed = started.elapsed().as_millis() as u64;
                info!(root = %request.directory, files = files.len(), elapsed_ms = elapsed, "扫描完成");
                ScanResult::completed(&request.directory, files, elapsed)
            }
            Err(e) => {
                let elapsed = started.elapsed().as_millis() as u64;
                error!(root = %request.directory, kind = ?e.kind(), "扫描失败: {}", e);
                ScanResult::failed(&request.directory, &e, elapsed)
            }
        }
    }

    /// 扫描并返回排序后的文件列表
    pub async fn scan_files(
        &self,
        request: &ScanRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileRecord>> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.collect(request, cancel))
                .await
                .unwrap_or(Err(ScanError::ScanTimeout(deadline.as_millis() as u64))),
            None => self.collect(request, cancel).await,
        }
    }

    async fn collect(&self, request: &ScanRequest, cancel: &CancellationToken) -> Result<Vec<FileRecord>> {
        if !self.fs.exists(&request.directory).await {
            return Err(ScanError::DirectoryNotFound(request.directory.clone()));
        }

        let pattern = Pattern::new(&request.pattern)
            .map_err(|e| ScanError::Unexpected(format!("invalid pattern '{}': {}", request.pattern, e)))?;

        let mut paths = Vec::new();
        for root in request.roots() {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            match self.fs.list_files(&root, &pattern, request.recursive).await {
                Ok(found) => {
                    debug!(root = %root, files = found.len(), "枚举完成");
                    paths.extend(found);
                }
                Err(StorageError::NotFound(_)) if root != request.directory => {
                    warn!("跳过不存在的目录: {}", root);
                }
                Err(StorageError::NotFound(p)) => return Err(ScanError::DirectoryNotFound(p)),
                Err(StorageError::PermissionDenied(p)) => return Err(ScanError::AccessDenied(p)),
                Err(e) => return Err(ScanError::Unexpected(e.to_string())),
            }
        }

        // 多个目录可能重叠
        paths.sort();
        paths.dedup();

        let mut files = self.read_all(paths, &request.directory, cancel).await?;
        sort_records(&mut files);
        Ok(files)
    }

    /// 有界并发读取元数据，单个文件失败只记录日志
    async fn read_all(
        &self,
        paths: Vec<String>,
        base: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileRecord>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let token = cancel.child_token();
        // 提前返回或被超时丢弃时停止剩余任务
        let guard_token = token.clone();
        scopeguard::defer! {
            guard_token.cancel();
        }

        let total = paths.len();
        let mut tasks = JoinSet::new();

        for path in paths {
            let permit = tokio::select! {
                _ = token.cancelled() => return Err(ScanError::Cancelled),
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|e| ScanError::Unexpected(e.to_string()))?
                }
            };

            let reader = self.reader.clone();
            let base = base.to_string();
            let task_token = token.clone();
            tasks.spawn(async move {
                let _permit = permit;
                tokio::select! {
                    _ = task_token.cancelled() => None,
                    result = reader.read(&path, &base) => match result {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!("跳过文件: {}", e);
                            None
                        }
                    },
                }
            });
        }

        let mut files = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(record)) => files.push(record),
                Ok(None) => {}
                Err(e) => warn!("读取任务失败: {}", e),
            }
        }

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        debug!(read = files.len(), skipped = total - files.len(), "元数据读取完成");
        Ok(files)
    }
}

/// 按文件名（区分大小写）排序，同名按完整路径
pub fn sort_records(files: &mut [FileRecord]) {
    files.sort_by(|a, b| {
        a.name()
            .cmp(b.name())
            .then_with(|| a.full_path().cmp(b.full_path()))
    });
}
