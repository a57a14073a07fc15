use crate::error::ErrorKind;
use crate::models::{ComparisonResult, DirectoryPair, ScanTarget};
use crate::AppState;
use serde::Serialize;
use tracing::info;

/// 智能对比两个版本目录
pub async fn compare_folders(
    state: &AppState,
    current_root: &str,
    future_root: &str,
    target: &ScanTarget,
    pattern: Option<&str>,
) -> ComparisonResult {
    info!("收到对比请求: {} <-> {}", current_root, future_root);
    let cancel = state.cancel.child_token();
    state
        .orchestrator(pattern)
        .compare_smart(current_root, future_root, target, &cancel)
        .await
}

/// 目录匹配诊断结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub success: bool,
    pub message: String,
    pub pairs: Vec<DirectoryPair>,
    pub current_only: Vec<String>,
    pub future_only: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// 只匹配目录，列出两侧未匹配项
pub async fn match_directories(
    state: &AppState,
    current_root: &str,
    future_root: &str,
    target: &ScanTarget,
) -> MatchResult {
    let cancel = state.cancel.child_token();
    match state
        .orchestrator(None)
        .match_roots(current_root, future_root, target, &cancel)
        .await
    {
        Ok(matched) => MatchResult {
            success: true,
            message: format!("{} folder pair(s) found", matched.pairs.len()),
            pairs: matched.pairs,
            current_only: matched.current_only,
            future_only: matched.future_only,
            error: None,
            error_kind: None,
        },
        Err(e) => MatchResult {
            success: false,
            message: e.summary().to_string(),
            pairs: Vec::new(),
            current_only: Vec::new(),
            future_only: Vec::new(),
            error: Some(e.to_string()),
            error_kind: Some(e.kind()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::core::remote_scan::tests::ScriptedExecutor;
    use crate::storage::{MemoryFileSystem, MemoryVersionReader};
    use chrono::NaiveDateTime;
    use std::sync::Arc;

    fn state() -> AppState {
        let ts = NaiveDateTime::default();
        let mut fs = MemoryFileSystem::new();
        fs.add_file("/app/current/v1/tool.exe", 2048, ts)
            .add_file("/app/current/v1/tool.dll", 2048, ts)
            .add_file("/app/future/v1-20240601T000000Z-1-1/tool.exe", 3000, ts)
            .add_file("/app/future/v1-20240601T000000Z-1-1/tool.dll", 3000, ts)
            .add_dir("/app/future/v2");
        AppState::with_capabilities(
            "/tmp/versionscan-test".into(),
            ScannerConfig::default(),
            Arc::new(fs),
            Arc::new(MemoryVersionReader::new()),
            Arc::new(ScriptedExecutor::default()),
        )
    }

    #[tokio::test]
    async fn test_compare_uses_default_pattern() {
        let result = compare_folders(&state(), "/app/current", "/app/future", &ScanTarget::Local, None).await;
        assert!(result.success);
        assert_eq!(result.paired_count, 1);
        assert_eq!(result.current_files.len(), 1);
        assert_eq!(result.current_files[0].name(), "tool.exe");
    }

    #[tokio::test]
    async fn test_compare_with_custom_pattern() {
        let result = compare_folders(
            &state(),
            "/app/current",
            "/app/future",
            &ScanTarget::Local,
            Some("*.dll"),
        )
        .await;
        assert_eq!(result.future_files.len(), 1);
        assert_eq!(result.future_files[0].name(), "tool.dll");
    }

    #[tokio::test]
    async fn test_match_directories() {
        let result = match_directories(&state(), "/app/current", "/app/future", &ScanTarget::Local).await;
        assert!(result.success);
        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.future_only, vec!["/app/future/v2"]);

        let result = match_directories(&state(), "/missing", "/app/future", &ScanTarget::Local).await;
        assert_eq!(result.error_kind, Some(ErrorKind::DirectoryNotFound));
    }
}
