use super::{name_matches, FileMeta, FileSystem, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use walkdir::WalkDir;

/// 本地文件系统
pub struct LocalFileSystem {
    name: String,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self {
            name: "local".to_string(),
        }
    }

    fn path_string(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &str) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn list_files(
        &self,
        path: &str,
        pattern: &Pattern,
        recursive: bool,
    ) -> Result<Vec<String>, StorageError> {
        let root = PathBuf::from(path);
        let pattern = pattern.clone();
        let root_str = path.to_string();

        // 使用 spawn_blocking 避免阻塞 async runtime
        tokio::task::spawn_blocking(move || {
            // 根目录打不开直接报错，区分不存在和无权限
            std::fs::read_dir(&root).map_err(|e| StorageError::from_io(&root_str, e))?;

            let max_depth = if recursive { usize::MAX } else { 1 };
            let mut files = Vec::new();

            for entry in WalkDir::new(&root)
                .min_depth(1)
                .max_depth(max_depth)
                .follow_links(false)
            {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        // 子目录不可读，跳过
                        warn!("跳过无法读取的路径: {}", e);
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                let matched = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name_matches(&pattern, name));
                if matched {
                    files.push(Self::path_string(entry.path()));
                }
            }

            Ok(files)
        })
        .await
        .map_err(|e| StorageError::Io {
            path: path.to_string(),
            source: std::io::Error::other(e),
        })?
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;

        let mut dirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(path, e))?
        {
            match entry.file_type().await {
                Ok(t) if t.is_dir() => dirs.push(Self::path_string(&entry.path())),
                Ok(_) => {}
                Err(e) => warn!("无法读取目录项类型 {:?}: {}", entry.path(), e),
            }
        }

        // read_dir 顺序不固定
        dirs.sort();
        Ok(dirs)
    }

    async fn stat(&self, path: &str) -> Result<FileMeta, StorageError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::from_io(path, e))?;

        Ok(FileMeta {
            size_bytes: metadata.len(),
            modified: DateTime::<Local>::from(modified).naive_local(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
