//! 远程命令执行抽象
//!
//! 核心只依赖 [`RemoteExecutor`] / [`RemoteSession`]，具体协议由实现决定
//! （默认实现见 [`powershell::PowerShellExecutor`]）。

pub mod payload;
pub mod powershell;
pub mod script;

use crate::config::RemoteConfig;
use crate::models::Credentials;
use async_trait::async_trait;
use std::time::Duration;

pub use payload::{parse_directory_payload, parse_scan_payload, ParsedPayload, RemoteFileEntry};
pub use powershell::PowerShellExecutor;

/// 会话超时设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteOptions {
    /// 建立会话
    pub open_timeout: Duration,
    /// 单次执行
    pub operation_timeout: Duration,
}

impl RemoteOptions {
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            open_timeout: Duration::from_millis(config.open_timeout_ms),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
        }
    }
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self::from_config(&RemoteConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// 远程脚本自身报告的错误
    #[error("script failed: {}", .0.join("\n"))]
    Script(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 远程命令执行器
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
        options: &RemoteOptions,
    ) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// 已建立的远程会话，用完必须 `close`
#[async_trait]
pub trait RemoteSession: Send {
    /// 执行脚本并返回标准输出
    async fn run(&mut self, script: &str) -> Result<String, RemoteError>;

    /// 关闭会话，可重复调用
    async fn close(&mut self);
}
