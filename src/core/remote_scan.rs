use crate::core::scanner::sort_records;
use crate::error::{Result, ScanError};
use crate::models::{Credentials, FileRecord, RemoteScanRequest, ScanResult};
use crate::remote::{
    parse_directory_payload, parse_scan_payload, script, RemoteError, RemoteExecutor,
    RemoteOptions, RemoteSession,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 远程扫描引擎：一次扫描只开一个会话，执行一个批量脚本
pub struct RemoteScanEngine {
    executor: Arc<dyn RemoteExecutor>,
    options: RemoteOptions,
}

impl RemoteScanEngine {
    pub fn new(executor: Arc<dyn RemoteExecutor>, options: RemoteOptions) -> Self {
        Self { executor, options }
    }

    pub async fn scan(&self, request: &RemoteScanRequest, cancel: &CancellationToken) -> ScanResult {
        let started = Instant::now();
        info!(host = %request.host, path = %request.path, pattern = %request.pattern, "开始远程扫描");

        let result = match self.scan_files(request, cancel).await {
            Ok(files) => {
                let elapsed = started.elapsed().as_millis() as u64;
                info!(host = %request.host, files = files.len(), elapsed_ms = elapsed, "远程扫描完成");
                ScanResult::completed(&request.path, files, elapsed)
            }
            Err(e) => {
                let elapsed = started.elapsed().as_millis() as u64;
                error!(host = %request.host, kind = ?e.kind(), "远程扫描失败: {}", e);
                ScanResult::failed(&request.path, &e, elapsed)
            }
        };
        result.with_source_host(&request.host)
    }

    pub async fn scan_files(
        &self,
        request: &RemoteScanRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileRecord>> {
        let script = script::scan_script(
            &request.path,
            &request.roots(),
            &request.pattern,
            request.recursive,
        );
        let output = self
            .execute(&request.host, &request.credentials, &script, cancel)
            .await?;

        let parsed = parse_scan_payload(&output, &request.host)?;
        if parsed.skipped > 0 {
            warn!(host = %request.host, skipped = parsed.skipped, "部分远程记录无效");
        }

        let mut files = parsed.records;
        sort_records(&mut files);
        Ok(files)
    }

    /// 远程目录的直接子目录
    pub async fn list_directories(
        &self,
        host: &str,
        credentials: &Credentials,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let output = self
            .execute(host, credentials, &script::list_directories_script(path), cancel)
            .await?;
        parse_directory_payload(&output, host)
    }

    /// 打开会话、执行一个脚本，无论结果如何都关闭会话
    pub async fn execute(
        &self,
        host: &str,
        credentials: &Credentials,
        script: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let open_timeout = self.options.open_timeout;
        let mut session: Box<dyn RemoteSession> = tokio::select! {
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            opened = tokio::time::timeout(
                open_timeout,
                self.executor.connect(host, credentials, &self.options),
            ) => match opened {
                Ok(Ok(session)) => session,
                Ok(Err(e)) => return Err(remote_error(host, e)),
                Err(_) => {
                    return Err(ScanError::RemoteTimeout {
                        host: host.to_string(),
                        timeout_ms: open_timeout.as_millis() as u64,
                    })
                }
            },
        };

        let operation_timeout = self.options.operation_timeout;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            ran = tokio::time::timeout(operation_timeout, session.run(script)) => match ran {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(remote_error(host, e)),
                Err(_) => Err(ScanError::RemoteTimeout {
                    host: host.to_string(),
                    timeout_ms: operation_timeout.as_millis() as u64,
                }),
            },
        };

        session.close().await;
        outcome
    }
}

/// 执行器错误映射为扫描错误
pub fn remote_error(host: &str, err: RemoteError) -> ScanError {
    match err {
        RemoteError::Auth(reason) => ScanError::RemoteAuth {
            host: host.to_string(),
            reason,
        },
        RemoteError::Connect(reason) => ScanError::RemoteConnect {
            host: host.to_string(),
            reason,
        },
        RemoteError::Io(e) => ScanError::RemoteConnect {
            host: host.to_string(),
            reason: e.to_string(),
        },
        RemoteError::Timeout(timeout_ms) => ScanError::RemoteTimeout {
            host: host.to_string(),
            timeout_ms,
        },
        RemoteError::Script(errors) => ScanError::RemoteCommand(errors),
    }
}
