pub mod local;
pub mod memory;
pub mod version;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use glob::{MatchOptions, Pattern};

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;
pub use version::{MemoryVersionReader, PeVersionReader, VersionReader};

/// 文件名匹配选项（与 Windows 一致，不区分大小写）
pub const NAME_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// 存储层错误
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// 按 io::ErrorKind 归类
    pub fn from_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(path),
            _ => StorageError::Io { path, source },
        }
    }
}

/// 文件元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub size_bytes: u64,
    /// 本地时间，无时区
    pub modified: NaiveDateTime,
}

/// 文件系统抽象接口
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// 目录是否存在
    async fn exists(&self, path: &str) -> bool;

    /// 列出匹配 `pattern` 的文件完整路径
    ///
    /// 根目录无法打开时返回错误；子目录无法读取时跳过。
    async fn list_files(
        &self,
        path: &str,
        pattern: &Pattern,
        recursive: bool,
    ) -> Result<Vec<String>, StorageError>;

    /// 列出直接子目录（按名称排序）
    async fn list_directories(&self, path: &str) -> Result<Vec<String>, StorageError>;

    /// 获取文件元数据
    async fn stat(&self, path: &str) -> Result<FileMeta, StorageError>;

    /// 存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 文件名是否匹配
pub fn name_matches(pattern: &Pattern, name: &str) -> bool {
    pattern.matches_with(name, NAME_MATCH)
}

/// 取路径最后一段，同时兼容 `/` 和 `\`
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

/// 计算相对路径；不在 `base` 之下时返回原路径
pub fn relative_path(full: &str, base: &str) -> String {
    let base = base.trim_end_matches(['/', '\\']);
    match full.strip_prefix(base) {
        Some(rest) if rest.starts_with(['/', '\\']) || base.is_empty() => {
            rest.trim_start_matches(['/', '\\']).to_string()
        }
        _ => full.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matches_ignores_case() {
        let pattern = Pattern::new("*.exe").unwrap();
        assert!(name_matches(&pattern, "Tool.EXE"));
        assert!(name_matches(&pattern, "tool.exe"));
        assert!(!name_matches(&pattern, "tool.exe.config"));
        assert!(!name_matches(&pattern, "tool.dll"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/app/current/v1/tool.exe"), "tool.exe");
        assert_eq!(file_name(r"C:\deploy\Api\api.exe"), "api.exe");
        assert_eq!(file_name("/app/current/"), "current");
        assert_eq!(file_name("tool.exe"), "tool.exe");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/app/current/v1/tool.exe", "/app/current"), "v1/tool.exe");
        assert_eq!(relative_path("/app/current/v1/tool.exe", "/app/current/"), "v1/tool.exe");
        assert_eq!(relative_path(r"C:\deploy\Api\api.exe", r"C:\deploy"), r"Api\api.exe");
        // 前缀相同但不是父目录
        assert_eq!(relative_path("/app/currently/a.exe", "/app/current"), "/app/currently/a.exe");
    }

    #[test]
    fn test_storage_error_from_io() {
        let err = StorageError::from_io(
            "/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, StorageError::PermissionDenied(_)));
        let err = StorageError::from_io("/x", std::io::Error::other("boom"));
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
