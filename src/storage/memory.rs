//! 内存文件系统，用于测试和演示

use super::{file_name, name_matches, FileMeta, FileSystem, StorageError};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use glob::Pattern;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct MemoryFile {
    meta: FileMeta,
    readable: bool,
}

/// 以 `/` 分隔路径的内存文件树
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<String, MemoryFile>,
    dirs: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加文件，父目录自动创建
    pub fn add_file(&mut self, path: &str, size_bytes: u64, modified: NaiveDateTime) -> &mut Self {
        self.insert(path, size_bytes, modified, true)
    }

    /// 添加可列出但 stat 失败的文件
    pub fn add_unreadable_file(&mut self, path: &str) -> &mut Self {
        self.insert(path, 0, NaiveDateTime::default(), false)
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        for ancestor in ancestors(&path) {
            self.dirs.insert(ancestor);
        }
        self.dirs.insert(path);
        self
    }

    /// 标记目录无访问权限
    pub fn deny(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        self.add_dir(&path);
        self.denied.insert(path);
        self
    }

    fn insert(&mut self, path: &str, size_bytes: u64, modified: NaiveDateTime, readable: bool) -> &mut Self {
        let path = normalize(path);
        for ancestor in ancestors(&path) {
            self.dirs.insert(ancestor);
        }
        self.files.insert(
            path,
            MemoryFile {
                meta: FileMeta {
                    size_bytes,
                    modified,
                },
                readable,
            },
        );
        self
    }

    fn check_dir(&self, path: &str) -> Result<(), StorageError> {
        if !self.dirs.contains(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if self.denied.contains(path) {
            return Err(StorageError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }

    /// 路径位于被拒绝的子目录下
    fn under_denied(&self, path: &str, root: &str) -> bool {
        ancestors(path)
            .into_iter()
            .any(|a| a.len() > root.len() && self.denied.contains(&a))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parent(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) if path.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        out.push(p.to_string());
        current = parent(p);
    }
    out
}

fn is_under(path: &str, root: &str) -> bool {
    if root == "/" {
        return path.starts_with('/') && path != "/";
    }
    path.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn exists(&self, path: &str) -> bool {
        self.dirs.contains(&normalize(path))
    }

    async fn list_files(
        &self,
        path: &str,
        pattern: &Pattern,
        recursive: bool,
    ) -> Result<Vec<String>, StorageError> {
        let root = normalize(path);
        self.check_dir(&root)?;

        Ok(self
            .files
            .keys()
            .filter(|p| is_under(p, &root))
            .filter(|p| recursive || parent(p) == Some(root.as_str()))
            .filter(|p| !self.under_denied(p, &root))
            .filter(|p| name_matches(pattern, file_name(p)))
            .cloned()
            .collect())
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let root = normalize(path);
        self.check_dir(&root)?;

        Ok(self
            .dirs
            .iter()
            .filter(|d| parent(d) == Some(root.as_str()))
            .cloned()
            .collect())
    }

    async fn stat(&self, path: &str) -> Result<FileMeta, StorageError> {
        match self.files.get(&normalize(path)) {
            Some(file) if file.readable => Ok(file.meta),
            Some(_) => Err(StorageError::PermissionDenied(path.to_string())),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
