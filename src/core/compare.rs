//! 智能对比：先匹配两侧子目录，再只扫描匹配上的目录

use crate::core::matcher::match_folders;
use crate::core::remote_scan::RemoteScanEngine;
use crate::core::scanner::LocalScanner;
use crate::error::{Result, ScanError};
use crate::models::{
    ComparisonResult, FileRecord, FolderMatch, RemoteScanRequest, ScanRequest, ScanTarget,
    DEFAULT_PATTERN,
};
use crate::storage::{FileSystem, StorageError};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct ComparisonOrchestrator {
    fs: Arc<dyn FileSystem>,
    scanner: LocalScanner,
    remote: Option<RemoteScanEngine>,
    pattern: String,
}

impl ComparisonOrchestrator {
    pub fn new(fs: Arc<dyn FileSystem>, scanner: LocalScanner) -> Self {
        Self {
            fs,
            scanner,
            remote: None,
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }

    pub fn with_remote(mut self, engine: RemoteScanEngine) -> Self {
        self.remote = Some(engine);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// 只做目录匹配，不扫描文件
    pub async fn match_roots(
        &self,
        current_root: &str,
        future_root: &str,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<FolderMatch> {
        let current = self.list_directories(current_root, target, cancel).await?;
        let future = self.list_directories(future_root, target, cancel).await?;
        let matched = match_folders(&current, &future);
        info!(
            pairs = matched.pairs.len(),
            current_only = matched.current_only.len(),
            future_only = matched.future_only.len(),
            "目录匹配完成"
        );
        Ok(matched)
    }

    pub async fn compare_smart(
        &self,
        current_root: &str,
        future_root: &str,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> ComparisonResult {
        let started = Instant::now();
        info!(current = %current_root, future = %future_root, "开始智能对比");

        let matched = match self.match_roots(current_root, future_root, target, cancel).await {
            Ok(m) => m,
            Err(e) => {
                return self.fail(current_root, future_root, FolderMatch::default(), &e, started)
            }
        };

        if matched.pairs.is_empty() {
            let err = ScanError::NoMatchingFolders {
                current: current_root.to_string(),
                future: future_root.to_string(),
            };
            return self.fail(current_root, future_root, matched, &err, started);
        }

        let current_dirs = matched.pairs.iter().map(|p| p.current_path.clone()).collect();
        let future_dirs = matched.pairs.iter().map(|p| p.future_path.clone()).collect();

        let scans = tokio::try_join!(
            self.scan_side(current_root, current_dirs, target, cancel),
            self.scan_side(future_root, future_dirs, target, cancel),
        );
        let (current_files, future_files) = match scans {
            Ok(files) => files,
            Err(e) => return self.fail(current_root, future_root, matched, &e, started),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let paired_count = matched.pairs.len();
        info!(
            paired = paired_count,
            current_files = current_files.len(),
            future_files = future_files.len(),
            elapsed_ms = duration_ms,
            "智能对比完成"
        );

        ComparisonResult {
            success: true,
            message: format!(
                "Comparison completed. {} folder pair(s), {} current file(s), {} future file(s)",
                paired_count,
                current_files.len(),
                future_files.len()
            ),
            current_root: current_root.to_string(),
            future_root: future_root.to_string(),
            paired_count,
            pairs: matched.pairs,
            current_only: matched.current_only,
            future_only: matched.future_only,
            current_files,
            future_files,
            duration_ms,
            error: None,
            error_kind: None,
            suggestions: Vec::new(),
        }
    }

    fn fail(
        &self,
        current_root: &str,
        future_root: &str,
        matched: FolderMatch,
        err: &ScanError,
        started: Instant,
    ) -> ComparisonResult {
        error!(kind = ?err.kind(), "智能对比失败: {}", err);
        ComparisonResult::failed(
            current_root,
            future_root,
            matched,
            err,
            started.elapsed().as_millis() as u64,
        )
    }

    fn remote_engine(&self) -> Result<&RemoteScanEngine> {
        self.remote
            .as_ref()
            .ok_or_else(|| ScanError::Unexpected("remote executor is not configured".to_string()))
    }

    async fn list_directories(
        &self,
        root: &str,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        match target {
            ScanTarget::Local => self.fs.list_directories(root).await.map_err(|e| match e {
                StorageError::NotFound(p) => ScanError::DirectoryNotFound(p),
                StorageError::PermissionDenied(p) => ScanError::AccessDenied(p),
                other => ScanError::Unexpected(other.to_string()),
            }),
            ScanTarget::Remote { host, credentials } => {
                self.remote_engine()?
                    .list_directories(host, credentials, root, cancel)
                    .await
            }
        }
    }

    /// 扫描一侧，仅限匹配上的目录，递归
    async fn scan_side(
        &self,
        root: &str,
        folders: Vec<String>,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileRecord>> {
        match target {
            ScanTarget::Local => {
                let request = ScanRequest::new(root)
                    .with_pattern(self.pattern.clone())
                    .with_folders(folders);
                self.scanner.scan_files(&request, cancel).await
            }
            ScanTarget::Remote { host, credentials } => {
                let request = RemoteScanRequest::new(host.clone(), credentials.clone(), root)
                    .with_pattern(self.pattern.clone())
                    .with_folders(folders);
                self.remote_engine()?.scan_files(&request, cancel).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::remote_scan::tests::ScriptedExecutor;
    use crate::error::ErrorKind;
    use crate::models::Credentials;
    use crate::remote::RemoteOptions;
    use crate::storage::{LocalFileSystem, MemoryFileSystem, MemoryVersionReader, PeVersionReader};
    use chrono::NaiveDateTime;

    fn orchestrator(fs: MemoryFileSystem) -> ComparisonOrchestrator {
        let fs: Arc<dyn FileSystem> = Arc::new(fs);
        let scanner = LocalScanner::new(fs.clone(), Arc::new(MemoryVersionReader::new()));
        ComparisonOrchestrator::new(fs, scanner)
    }

    fn app_tree() -> MemoryFileSystem {
        let ts = NaiveDateTime::default();
        let mut fs = MemoryFileSystem::new();
        fs.add_file("/app/current/v1/tool.exe", 2048, ts)
            .add_file("/app/future/v1-20240601T000000Z-1-1/tool.exe", 3000, ts);
        fs
    }

    #[tokio::test]
    async fn test_compare_smart_end_to_end() {
        let result = orchestrator(app_tree())
            .compare_smart("/app/current", "/app/future", &ScanTarget::Local, &CancellationToken::new())
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.paired_count, 1);
        assert_eq!(result.current_files.len(), 1);
        assert_eq!(result.future_files.len(), 1);
        assert_eq!(result.current_files[0].size_display(), "2,00 KB");
        assert_eq!(result.future_files[0].size_display(), "2,92 KB");
        assert_eq!(result.future_files[0].relative_path(), "v1-20240601T000000Z-1-1/tool.exe");
    }

    #[tokio::test]
    async fn test_only_paired_folders_are_scanned() {
        let ts = NaiveDateTime::default();
        let mut fs = app_tree();
        fs.add_file("/app/current/legacy/old.exe", 10, ts)
            .add_file("/app/future/extra-20240601T000000Z-2-2/new.exe", 10, ts);

        let result = orchestrator(fs)
            .compare_smart("/app/current", "/app/future", &ScanTarget::Local, &CancellationToken::new())
            .await;

        assert_eq!(result.paired_count, 1);
        assert_eq!(result.current_files.len(), 1);
        assert_eq!(result.future_files.len(), 1);
        assert_eq!(result.current_only, vec!["/app/current/legacy"]);
        assert_eq!(result.future_only, vec!["/app/future/extra-20240601T000000Z-2-2"]);
    }

    #[tokio::test]
    async fn test_no_matching_folders() {
        let ts = NaiveDateTime::default();
        let mut fs = MemoryFileSystem::new();
        fs.add_file("/app/current/a/a.exe", 1, ts)
            .add_file("/app/future/b/b.exe", 1, ts);

        let result = orchestrator(fs)
            .compare_smart("/app/current", "/app/future", &ScanTarget::Local, &CancellationToken::new())
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::NoMatchingFolders));
        assert_eq!(result.current_only, vec!["/app/current/a"]);
        assert!(result.current_files.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root() {
        let result = orchestrator(app_tree())
            .compare_smart("/app/current", "/app/nope", &ScanTarget::Local, &CancellationToken::new())
            .await;
        assert_eq!(result.error_kind, Some(ErrorKind::DirectoryNotFound));
    }

    #[tokio::test]
    async fn test_remote_target_without_engine() {
        let target = ScanTarget::Remote {
            host: "h".into(),
            credentials: Credentials::new("u", "p"),
        };
        let result = orchestrator(app_tree())
            .compare_smart("/a", "/b", &target, &CancellationToken::new())
            .await;
        assert_eq!(result.error_kind, Some(ErrorKind::UnexpectedFailure));
    }

    #[tokio::test]
    async fn test_remote_match_roots() {
        let executor = Arc::new(ScriptedExecutor::with_responses(vec![
            Ok(r#"["D:\\cur\\Api","D:\\cur\\Old"]"#.into()),
            Ok(r#"["D:\\fut\\API-20240601T000000Z-3-9"]"#.into()),
        ]));
        let target = ScanTarget::Remote {
            host: "10.0.0.5".into(),
            credentials: Credentials::new("u", "p"),
        };
        let matched = orchestrator(MemoryFileSystem::new())
            .with_remote(RemoteScanEngine::new(executor, RemoteOptions::default()))
            .match_roots(r"D:\cur", r"D:\fut", &target, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(matched.pairs.len(), 1);
        assert_eq!(matched.pairs[0].future_path, r"D:\fut\API-20240601T000000Z-3-9");
        assert_eq!(matched.current_only, vec![r"D:\cur\Old"]);
    }

    #[tokio::test]
    async fn test_remote_compare() {
        // 两次扫描并发执行，返回相同内容以免依赖顺序
        let scan = r#"[{"Name":"api.exe","SizeBytes":2048}]"#;
        let executor = Arc::new(ScriptedExecutor::with_responses(vec![
            Ok(r#"["D:\\cur\\Api"]"#.into()),
            Ok(r#"["D:\\fut\\API-20240601T000000Z-3-9"]"#.into()),
            Ok(scan.into()),
            Ok(scan.into()),
        ]));
        let target = ScanTarget::Remote {
            host: "10.0.0.5".into(),
            credentials: Credentials::new("u", "p"),
        };
        let result = orchestrator(MemoryFileSystem::new())
            .with_remote(RemoteScanEngine::new(executor.clone(), RemoteOptions::default()))
            .compare_smart(r"D:\cur", r"D:\fut", &target, &CancellationToken::new())
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.paired_count, 1);
        assert_eq!(result.current_files.len(), 1);
        assert_eq!(result.future_files.len(), 1);
        assert_eq!(result.current_files[0].source_host(), Some("10.0.0.5"));

        let scripts = executor.scripts.lock().unwrap();
        assert_eq!(scripts.len(), 4);
        // 扫描只限匹配上的目录
        assert!(scripts[2..].iter().any(|s| s.contains(r"@('D:\cur\Api')")));
        assert!(scripts[2..]
            .iter()
            .any(|s| s.contains(r"@('D:\fut\API-20240601T000000Z-3-9')")));
    }

    #[tokio::test]
    async fn test_remote_compare_scans_shared_future_folder_once() {
        // 两个 current 目录规范化后同名，都配到同一个 future 目录
        let scan = r#"[{"Name":"api.exe","SizeBytes":2048}]"#;
        let executor = Arc::new(ScriptedExecutor::with_responses(vec![
            Ok(r#"["D:\\cur\\Api","D:\\cur\\Api-20240101T120000Z-1-1"]"#.into()),
            Ok(r#"["D:\\fut\\API-20240601T000000Z-3-9"]"#.into()),
            Ok(scan.into()),
            Ok(scan.into()),
        ]));
        let target = ScanTarget::Remote {
            host: "10.0.0.5".into(),
            credentials: Credentials::new("u", "p"),
        };
        let result = orchestrator(MemoryFileSystem::new())
            .with_remote(RemoteScanEngine::new(executor.clone(), RemoteOptions::default()))
            .compare_smart(r"D:\cur", r"D:\fut", &target, &CancellationToken::new())
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.paired_count, 2);

        let scripts = executor.scripts.lock().unwrap();
        let future_scan = scripts[2..]
            .iter()
            .find(|s| s.contains(r"$base = 'D:\fut'"))
            .unwrap();
        assert!(future_scan.contains(r"@('D:\fut\API-20240601T000000Z-3-9'))"));
        assert_eq!(future_scan.matches("API-20240601T000000Z-3-9").count(), 1);
    }

    #[tokio::test]
    async fn test_compare_real_directories() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("current").join("v1");
        let future = dir.path().join("future").join("v1-20240601T000000Z-1-1");
        std::fs::create_dir_all(&current).unwrap();
        std::fs::create_dir_all(&future).unwrap();
        std::fs::write(current.join("tool.exe"), vec![0u8; 2048]).unwrap();
        std::fs::write(future.join("tool.exe"), vec![0u8; 3000]).unwrap();

        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        let scanner = LocalScanner::new(fs.clone(), Arc::new(PeVersionReader));
        let result = ComparisonOrchestrator::new(fs, scanner)
            .compare_smart(
                dir.path().join("current").to_str().unwrap(),
                dir.path().join("future").to_str().unwrap(),
                &ScanTarget::Local,
                &CancellationToken::new(),
            )
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.paired_count, 1);
        assert_eq!(result.current_files[0].size_display(), "2,00 KB");
        assert_eq!(result.future_files[0].size_display(), "2,92 KB");
    }
}
