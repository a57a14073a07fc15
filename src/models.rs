//! 扫描器与命令层共用的请求/结果类型

use crate::core::size::format_size;
use crate::error::{ErrorKind, ScanError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// `lastModified` 的显示格式
pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// 默认文件匹配模式
pub const DEFAULT_PATTERN: &str = "*.exe";

/// 来源未提供时间时使用的 `0001-01-01T00:00:00`
pub fn unknown_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// 四段式文件版本 `major.minor.build.revision`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl FileVersion {
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl Serialize for FileVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 版本资源中的字段，缺失时全部取默认值
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: FileVersion,
    pub description: Option<String>,
    pub company: Option<String>,
    pub product_name: Option<String>,
}

/// 扫描到的单个文件
///
/// `sizeDisplay` 和 `lastModifiedDisplay` 在 [`FileRecord::new`] 中计算，不能单独设置。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    name: String,
    name_normalized: String,
    relative_path: String,
    full_path: String,
    version: FileVersion,
    size_bytes: u64,
    size_display: String,
    last_modified: NaiveDateTime,
    last_modified_display: String,
    description: Option<String>,
    company: Option<String>,
    product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_host: Option<String>,
}

impl FileRecord {
    pub fn new(
        name: impl Into<String>,
        relative_path: impl Into<String>,
        full_path: impl Into<String>,
        size_bytes: u64,
        last_modified: NaiveDateTime,
        info: VersionInfo,
    ) -> Self {
        let name = name.into();
        Self {
            name_normalized: name.to_lowercase(),
            name,
            relative_path: relative_path.into(),
            full_path: full_path.into(),
            version: info.version,
            size_bytes,
            size_display: format_size(size_bytes),
            last_modified,
            last_modified_display: last_modified.format(TIMESTAMP_DISPLAY_FORMAT).to_string(),
            description: non_empty(info.description),
            company: non_empty(info.company),
            product_name: non_empty(info.product_name),
            source_host: None,
        }
    }

    pub fn with_source_host(mut self, host: impl Into<String>) -> Self {
        self.source_host = Some(host.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_normalized(&self) -> &str {
        &self.name_normalized
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn version(&self) -> FileVersion {
        self.version
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn size_display(&self) -> &str {
        &self.size_display
    }

    pub fn last_modified(&self) -> NaiveDateTime {
        self.last_modified
    }

    pub fn last_modified_display(&self) -> &str {
        &self.last_modified_display
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    pub fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }

    pub fn source_host(&self) -> Option<&str> {
        self.source_host.as_deref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_recursive() -> bool {
    true
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

/// 本地扫描请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// 主目录，相对路径以它为基准
    pub directory: String,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// 非空时只枚举这些目录
    #[serde(default)]
    pub folders: Vec<String>,
}

impl ScanRequest {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            recursive: true,
            pattern: default_pattern(),
            folders: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_folders(mut self, folders: Vec<String>) -> Self {
        self.folders = folders;
        self
    }

    /// 实际枚举的目录，重复项只保留第一次出现
    pub fn roots(&self) -> Vec<String> {
        unique_roots(&self.directory, &self.folders)
    }
}

fn unique_roots(primary: &str, folders: &[String]) -> Vec<String> {
    if folders.is_empty() {
        return vec![primary.to_string()];
    }
    let mut seen = HashSet::new();
    folders
        .iter()
        .filter(|f| seen.insert(f.as_str()))
        .cloned()
        .collect()
}

/// 远程执行凭据
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// 远程扫描请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteScanRequest {
    pub host: String,
    pub credentials: Credentials,
    pub path: String,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub folders: Vec<String>,
}

impl RemoteScanRequest {
    pub fn new(host: impl Into<String>, credentials: Credentials, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            credentials,
            path: path.into(),
            recursive: true,
            pattern: default_pattern(),
            folders: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_folders(mut self, folders: Vec<String>) -> Self {
        self.folders = folders;
        self
    }

    pub fn roots(&self) -> Vec<String> {
        unique_roots(&self.path, &self.folders)
    }
}

/// 对比运行的位置
#[derive(Debug, Clone)]
pub enum ScanTarget {
    Local,
    Remote { host: String, credentials: Credentials },
}

/// 单次扫描结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub success: bool,
    pub message: String,
    pub root_directory: String,
    pub files: Vec<FileRecord>,
    pub total_files: usize,
    pub scan_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ScanResult {
    pub fn completed(
        root_directory: impl Into<String>,
        files: Vec<FileRecord>,
        scan_duration_ms: u64,
    ) -> Self {
        let total_files = files.len();
        Self {
            success: true,
            message: format!("Scan completed successfully. {} file(s) found", total_files),
            root_directory: root_directory.into(),
            files,
            total_files,
            scan_duration_ms,
            source_host: None,
            error: None,
            error_kind: None,
            suggestions: Vec::new(),
        }
    }

    pub fn failed(root_directory: impl Into<String>, err: &ScanError, scan_duration_ms: u64) -> Self {
        Self {
            success: false,
            message: err.summary().to_string(),
            root_directory: root_directory.into(),
            files: Vec::new(),
            total_files: 0,
            scan_duration_ms,
            source_host: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            suggestions: err.suggestions(),
        }
    }

    pub fn with_source_host(mut self, host: impl Into<String>) -> Self {
        self.source_host = Some(host.into());
        self
    }
}

/// 两侧同名（规范化后）的一对目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPair {
    pub current_path: String,
    pub future_path: String,
}

/// 目录匹配结果，含两侧未匹配项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMatch {
    pub pairs: Vec<DirectoryPair>,
    pub current_only: Vec<String>,
    pub future_only: Vec<String>,
}

/// 智能对比结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub success: bool,
    pub message: String,
    pub current_root: String,
    pub future_root: String,
    pub paired_count: usize,
    pub pairs: Vec<DirectoryPair>,
    pub current_only: Vec<String>,
    pub future_only: Vec<String>,
    pub current_files: Vec<FileRecord>,
    pub future_files: Vec<FileRecord>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ComparisonResult {
    pub fn failed(
        current_root: impl Into<String>,
        future_root: impl Into<String>,
        matched: FolderMatch,
        err: &ScanError,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: false,
            message: err.summary().to_string(),
            current_root: current_root.into(),
            future_root: future_root.into(),
            paired_count: 0,
            pairs: Vec::new(),
            current_only: matched.current_only,
            future_only: matched.future_only,
            current_files: Vec::new(),
            future_files: Vec::new(),
            duration_ms,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            suggestions: err.suggestions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap()
    }

    #[test]
    fn test_record_derives_display_fields() {
        let info = VersionInfo {
            version: FileVersion::new(1, 2, 3, 4),
            description: Some("  ".into()),
            company: Some("Acme".into()),
            product_name: None,
        };
        let record = FileRecord::new("Tool.EXE", "v1/Tool.EXE", "/app/v1/Tool.EXE", 3000, stamp(), info);

        assert_eq!(record.name_normalized(), "tool.exe");
        assert_eq!(record.size_display(), "2,92 KB");
        assert_eq!(record.last_modified_display(), "01/06/2024 09:05:03");
        assert_eq!(record.version().to_string(), "1.2.3.4");
        assert_eq!(record.description(), None);
        assert_eq!(record.company(), Some("Acme"));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = FileRecord::new("a.exe", "a.exe", "/x/a.exe", 10, stamp(), VersionInfo::default())
            .with_source_host("10.0.0.1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sizeDisplay"], "10 Bytes");
        assert_eq!(json["version"], "0.0.0.0");
        assert_eq!(json["lastModified"], "2024-06-01T09:05:03");
        assert_eq!(json["sourceHost"], "10.0.0.1");
    }

    #[test]
    fn test_scan_request_defaults() {
        let req: ScanRequest = serde_json::from_str(r#"{"directory":"/app"}"#).unwrap();
        assert!(req.recursive);
        assert_eq!(req.pattern, "*.exe");
        assert_eq!(req.roots(), vec!["/app".to_string()]);

        let req = req.with_folders(vec!["/app/a".into(), "/app/b".into()]);
        assert_eq!(req.roots().len(), 2);
    }

    #[test]
    fn test_roots_drop_repeated_folders() {
        let fut = r"D:\fut\API-20240601T000000Z-3-9".to_string();
        let req = RemoteScanRequest::new("h", Credentials::new("u", "p"), r"D:\fut").with_folders(vec![
            fut.clone(),
            r"D:\fut\Web".to_string(),
            fut.clone(),
        ]);
        assert_eq!(req.roots(), vec![fut, r"D:\fut\Web".to_string()]);
    }

    #[test]
    fn test_failed_result_has_no_files() {
        let err = ScanError::DirectoryNotFound("/missing".into());
        let result = ScanResult::failed("/missing", &err, 3);
        assert!(!result.success);
        assert_eq!(result.total_files, 0);
        assert_eq!(result.error_kind, Some(ErrorKind::DirectoryNotFound));
        assert_eq!(result.message, "Directory not found");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
