//! 扫描与对比错误

use serde::Serialize;

/// 失败结果中携带的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    DirectoryNotFound,
    AccessDenied,
    FileReadFailure,
    RemoteAuthFailure,
    RemoteConnectFailure,
    RemoteOperationTimeout,
    RemoteRecordParseFailure,
    RemoteCommandFailure,
    NoMatchingFolders,
    Cancelled,
    ScanTimeout,
    UnexpectedFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("directory '{0}' does not exist")]
    DirectoryNotFound(String),

    #[error("access denied to directory '{0}'")]
    AccessDenied(String),

    #[error("failed to read '{path}': {reason}")]
    FileRead { path: String, reason: String },

    #[error("remote authentication failed for {host}: {reason}")]
    RemoteAuth { host: String, reason: String },

    #[error("could not connect to {host}: {reason}")]
    RemoteConnect { host: String, reason: String },

    #[error("remote operation on {host} exceeded {timeout_ms}ms")]
    RemoteTimeout { host: String, timeout_ms: u64 },

    #[error("malformed remote record: {0}")]
    RemoteRecordParse(String),

    #[error("remote command failed: {}", .0.join("\n"))]
    RemoteCommand(Vec<String>),

    #[error("no matching folders between '{current}' and '{future}'")]
    NoMatchingFolders { current: String, future: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("scan exceeded its {0}ms deadline")]
    ScanTimeout(u64),

    #[error("{0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::DirectoryNotFound(_) => ErrorKind::DirectoryNotFound,
            ScanError::AccessDenied(_) => ErrorKind::AccessDenied,
            ScanError::FileRead { .. } => ErrorKind::FileReadFailure,
            ScanError::RemoteAuth { .. } => ErrorKind::RemoteAuthFailure,
            ScanError::RemoteConnect { .. } => ErrorKind::RemoteConnectFailure,
            ScanError::RemoteTimeout { .. } => ErrorKind::RemoteOperationTimeout,
            ScanError::RemoteRecordParse(_) => ErrorKind::RemoteRecordParseFailure,
            ScanError::RemoteCommand(_) => ErrorKind::RemoteCommandFailure,
            ScanError::NoMatchingFolders { .. } => ErrorKind::NoMatchingFolders,
            ScanError::Cancelled => ErrorKind::Cancelled,
            ScanError::ScanTimeout(_) => ErrorKind::ScanTimeout,
            ScanError::Unexpected(_) => ErrorKind::UnexpectedFailure,
        }
    }

    /// 简短摘要，详细信息放在 `error` 字段
    pub fn summary(&self) -> &'static str {
        match self {
            ScanError::DirectoryNotFound(_) => "Directory not found",
            ScanError::AccessDenied(_) => "You do not have permission to access this directory",
            ScanError::FileRead { .. } => "File could not be read",
            ScanError::RemoteAuth { .. } | ScanError::RemoteConnect { .. } => {
                "Authentication or connection error"
            }
            ScanError::RemoteTimeout { .. } => "Remote operation timed out",
            ScanError::RemoteRecordParse(_) => "Remote record could not be parsed",
            ScanError::RemoteCommand(_) => "Remote scan reported errors",
            ScanError::NoMatchingFolders { .. } => "No matching folders found",
            ScanError::Cancelled => "Operation cancelled",
            ScanError::ScanTimeout(_) => "Scan timed out",
            ScanError::Unexpected(_) => "Unexpected error while scanning",
        }
    }

    /// 远程会话级失败的处理建议
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            ScanError::RemoteAuth { .. } | ScanError::RemoteConnect { .. } => vec![
                "Verify the user name and password".to_string(),
                "Verify that WinRM is enabled on the remote host".to_string(),
                "Run on the remote host: Enable-PSRemoting -Force".to_string(),
            ],
            ScanError::RemoteTimeout { .. } => vec![
                "Increase remote.operationTimeoutMs or narrow the scanned path".to_string(),
            ],
            _ => Vec::new(),
        }
    }
}
