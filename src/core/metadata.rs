//! 单个文件的元数据读取

use crate::error::{Result, ScanError};
use crate::models::FileRecord;
use crate::storage::{file_name, relative_path, FileSystem, VersionReader};
use std::sync::Arc;
use tracing::debug;

/// 读取大小、修改时间和版本资源，组装成 [`FileRecord`]
#[derive(Clone)]
pub struct FileMetadataReader {
    fs: Arc<dyn FileSystem>,
    versions: Arc<dyn VersionReader>,
}

impl FileMetadataReader {
    pub fn new(fs: Arc<dyn FileSystem>, versions: Arc<dyn VersionReader>) -> Self {
        Self { fs, versions }
    }

    pub async fn read(&self, file_path: &str, base_directory: &str) -> Result<FileRecord> {
        let meta = self
            .fs
            .stat(file_path)
            .await
            .map_err(|e| file_read_error(file_path, e))?;

        // 版本资源解析是同步 IO
        let versions = self.versions.clone();
        let path = file_path.to_string();
        let info = tokio::task::spawn_blocking(move || versions.read_version_info(&path))
            .await
            .map_err(|e| file_read_error(file_path, e))?
            .map_err(|e| file_read_error(file_path, e))?;

        let record = FileRecord::new(
            file_name(file_path),
            relative_path(file_path, base_directory),
            file_path,
            meta.size_bytes,
            meta.modified,
            info,
        );
        debug!(
            path = %file_path,
            version = %record.version(),
            size = %record.size_display(),
            "读取文件元数据"
        );
        Ok(record)
    }
}

fn file_read_error(path: &str, reason: impl std::fmt::Display) -> ScanError {
    ScanError::FileRead {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileVersion, VersionInfo};
    use crate::storage::{MemoryFileSystem, MemoryVersionReader};
    use chrono::NaiveDate;

    fn reader() -> FileMetadataReader {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut fs = MemoryFileSystem::new();
        fs.add_file("/app/current/v1/tool.exe", 2048, ts)
            .add_unreadable_file("/app/current/v1/locked.exe")
            .add_file("/app/current/v1/bad.exe", 10, ts);

        let mut versions = MemoryVersionReader::new();
        versions
            .insert(
                "/app/current/v1/tool.exe",
                VersionInfo {
                    version: FileVersion::new(3, 1, 0, 7),
                    description: Some("Tool".into()),
                    company: None,
                    product_name: Some("Suite".into()),
                },
            )
            .fail_on("/app/current/v1/bad.exe");

        FileMetadataReader::new(Arc::new(fs), Arc::new(versions))
    }

    #[tokio::test]
    async fn test_read_builds_record() {
        let record = reader()
            .read("/app/current/v1/tool.exe", "/app/current")
            .await
            .unwrap();

        assert_eq!(record.name(), "tool.exe");
        assert_eq!(record.relative_path(), "v1/tool.exe");
        assert_eq!(record.full_path(), "/app/current/v1/tool.exe");
        assert_eq!(record.version().to_string(), "3.1.0.7");
        assert_eq!(record.size_display(), "2,00 KB");
        assert_eq!(record.last_modified_display(), "01/06/2024 12:00:00");
        assert_eq!(record.product_name(), Some("Suite"));
        assert_eq!(record.source_host(), None);
    }

    #[tokio::test]
    async fn test_read_failures_are_file_read_errors() {
        let reader = reader();

        let err = reader.read("/app/current/v1/locked.exe", "/app").await.unwrap_err();
        assert!(matches!(err, ScanError::FileRead { .. }));

        let err = reader.read("/app/current/v1/bad.exe", "/app").await.unwrap_err();
        assert!(matches!(err, ScanError::FileRead { .. }));
    }
}
