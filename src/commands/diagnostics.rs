//! 连接和目录诊断

use crate::core::remote_scan::RemoteScanEngine;
use crate::error::{ErrorKind, ScanError};
use crate::models::Credentials;
use crate::remote::script;
use crate::AppState;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 诊断结果
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResult {
    pub success: bool,
    pub host: String,
    pub command: String,
    pub output: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exe_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl DiagnosticResult {
    fn failed(host: &str, command: &str, err: &ScanError) -> Self {
        Self {
            success: false,
            host: host.to_string(),
            command: command.to_string(),
            message: err.summary().to_string(),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            suggestions: err.suggestions(),
            ..Default::default()
        }
    }
}

/// 远程目录探测脚本的输出
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DirectoryProbe {
    path: Option<String>,
    #[serde(default)]
    exists: bool,
    #[serde(default)]
    exe_count: u64,
}

/// 事件日志脚本的输出
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EventLogEntry {
    success: bool,
    hostname: Option<String>,
    log_time: Option<String>,
    source_used: Option<String>,
    error: Option<String>,
}

fn engine(state: &AppState) -> RemoteScanEngine {
    state.remote_engine()
}

/// 测试远程连接，返回远程主机名
pub async fn test_connection(state: &AppState, host: &str, credentials: &Credentials) -> DiagnosticResult {
    info!("测试远程连接: {}", host);
    let cancel = state.cancel.child_token();
    let command = script::probe_script();

    match engine(state).execute(host, credentials, command, &cancel).await {
        Ok(output) => {
            let output = output.trim().to_string();
            DiagnosticResult {
                success: true,
                host: host.to_string(),
                command: command.to_string(),
                message: format!("Connection successful. Remote host: {}", output),
                output: Some(output),
                ..Default::default()
            }
        }
        Err(e) => DiagnosticResult::failed(host, command, &e),
    }
}

async fn probe_directory(
    state: &AppState,
    host: &str,
    credentials: &Credentials,
    command: &str,
) -> Result<(DirectoryProbe, String), ScanError> {
    let cancel = state.cancel.child_token();
    let output = engine(state).execute(host, credentials, command, &cancel).await?;
    let probe = serde_json::from_str::<DirectoryProbe>(output.trim())
        .map_err(|e| ScanError::Unexpected(format!("invalid probe output: {}", e)))?;
    Ok((probe, output))
}

/// 远程目录是否存在及其中 exe 数量
pub async fn validate_remote_directory(
    state: &AppState,
    host: &str,
    credentials: &Credentials,
    path: &str,
) -> DiagnosticResult {
    info!("验证远程目录: {} 于 {}", path, host);
    let command = script::validate_directory_script(path);

    match probe_directory(state, host, credentials, &command).await {
        Ok((probe, output)) => DiagnosticResult {
            success: probe.exists,
            host: host.to_string(),
            command,
            output: Some(output.trim().to_string()),
            message: if probe.exists {
                format!("Directory exists with {} executable(s)", probe.exe_count)
            } else {
                format!("Directory '{}' does not exist on {}", path, host)
            },
            path: Some(path.to_string()),
            exists: Some(probe.exists),
            exe_count: Some(probe.exe_count),
            error_kind: (!probe.exists).then_some(ErrorKind::DirectoryNotFound),
            ..Default::default()
        },
        Err(e) => DiagnosticResult::failed(host, &command, &e),
    }
}

/// 在常用位置查找同名目录
pub async fn find_remote_directory(
    state: &AppState,
    host: &str,
    credentials: &Credentials,
    name: &str,
) -> DiagnosticResult {
    info!("查找远程目录 '{}' 于 {}", name, host);
    let command = script::find_directory_script(name);

    match probe_directory(state, host, credentials, &command).await {
        Ok((probe, output)) => {
            let found = probe.exists && probe.path.is_some();
            DiagnosticResult {
                success: found,
                host: host.to_string(),
                command,
                output: Some(output.trim().to_string()),
                message: match &probe.path {
                    Some(p) if found => format!("Found '{}' with {} executable(s)", p, probe.exe_count),
                    _ => format!("Folder '{}' not found in the usual locations", name),
                },
                path: probe.path,
                exists: Some(found),
                exe_count: Some(probe.exe_count),
                error_kind: (!found).then_some(ErrorKind::DirectoryNotFound),
                ..Default::default()
            }
        }
        Err(e) => DiagnosticResult::failed(host, &command, &e),
    }
}

/// 在远程主机的 Application 事件日志中记录本次连接
///
/// 写入失败不影响连接本身，结果里 `success` 为 false 并带上远程错误。
pub async fn log_connection_event(
    state: &AppState,
    host: &str,
    credentials: &Credentials,
) -> DiagnosticResult {
    info!("在 {} 上记录连接事件", host);
    let cancel = state.cancel.child_token();
    let command = script::connection_event_script(&credentials.user, host);

    let output = match engine(state).execute(host, credentials, &command, &cancel).await {
        Ok(output) => output,
        Err(e) => return DiagnosticResult::failed(host, &command, &e),
    };
    let entry = match serde_json::from_str::<EventLogEntry>(output.trim()) {
        Ok(entry) => entry,
        Err(e) => {
            let err = ScanError::Unexpected(format!("invalid event log output: {}", e));
            return DiagnosticResult::failed(host, &command, &err);
        }
    };

    if entry.success {
        DiagnosticResult {
            success: true,
            host: host.to_string(),
            command,
            output: Some(output.trim().to_string()),
            message: format!(
                "Connection event logged on {}",
                entry.hostname.as_deref().unwrap_or(host)
            ),
            log_time: entry.log_time,
            source_used: entry.source_used,
            ..Default::default()
        }
    } else {
        warn!("记录连接事件失败: {:?}", entry.error);
        DiagnosticResult {
            success: false,
            host: host.to_string(),
            command,
            output: Some(output.trim().to_string()),
            message: "Connection succeeded but the event could not be logged".to_string(),
            error: entry.error,
            error_kind: Some(ErrorKind::RemoteCommandFailure),
            ..Default::default()
        }
    }
}

/// 本地目录检查结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCheckResult {
    pub success: bool,
    pub message: String,
    pub details: Option<String>,
}

/// 检查本地路径是否存在、是否为目录、是否只读
pub async fn check_local_directory(path: &str) -> LocalCheckResult {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return LocalCheckResult {
                success: false,
                message: "Path does not exist".to_string(),
                details: Some(format!("'{}' does not exist", path)),
            }
        }
        Err(e) => {
            return LocalCheckResult {
                success: false,
                message: "Path is not accessible".to_string(),
                details: Some(format!("Cannot access '{}': {}", path, e)),
            }
        }
    };

    if !metadata.is_dir() {
        return LocalCheckResult {
            success: false,
            message: "Path is not a directory".to_string(),
            details: Some(format!("'{}' is not a directory", path)),
        };
    }

    LocalCheckResult {
        success: true,
        message: "Directory is accessible".to_string(),
        details: Some(
            if metadata.permissions().readonly() {
                "Read-only access"
            } else {
                "Read-write access"
            }
            .to_string(),
        ),
    }
}
