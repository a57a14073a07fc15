use crate::core::size::{describe_size as breakdown, SizeBreakdown};
use crate::models::{RemoteScanRequest, ScanRequest, ScanResult};
use crate::AppState;
use serde::Serialize;
use tracing::info;

/// 扫描本地目录
pub async fn scan_local(state: &AppState, request: ScanRequest) -> ScanResult {
    info!("收到本地扫描请求: {}", request.directory);
    let cancel = state.cancel.child_token();
    state.local_scanner().scan(&request, &cancel).await
}

/// 扫描远程目录
pub async fn scan_remote(state: &AppState, request: RemoteScanRequest) -> ScanResult {
    info!("收到远程扫描请求: {}:{}", request.host, request.path);
    let cancel = state.cancel.child_token();
    state.remote_engine().scan(&request, &cancel).await
}

/// 大小格式化诊断
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(flatten)]
    pub breakdown: SizeBreakdown,
}

pub fn describe_size(bytes: u64) -> SizeReport {
    SizeReport {
        success: true,
        file: None,
        breakdown: breakdown(bytes),
    }
}

/// 读取文件大小后格式化
pub async fn describe_file_size(path: &str) -> Result<SizeReport, String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| format!("无法读取文件 '{}': {}", path, e))?;
    if !metadata.is_file() {
        return Err(format!("'{}' 不是文件", path));
    }
    Ok(SizeReport {
        success: true,
        file: Some(path.to_string()),
        breakdown: breakdown(metadata.len()),
    })
}
