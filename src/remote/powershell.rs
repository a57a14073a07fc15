//! 通过本机 PowerShell 的 `Invoke-Command` 执行远程脚本
//!
//! 每次 `run` 启动一个 shell 进程，凭据通过环境变量传入，不出现在命令行上。

use super::script::quote;
use super::{RemoteError, RemoteExecutor, RemoteOptions, RemoteSession};
use crate::config::RemoteConfig;
use crate::models::Credentials;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

const USER_ENV: &str = "VERSIONSCAN_REMOTE_USER";
const PASSWORD_ENV: &str = "VERSIONSCAN_REMOTE_PASSWORD";

/// WinRM 远程执行器
#[derive(Debug, Clone)]
pub struct PowerShellExecutor {
    shell: String,
    port: u16,
    use_ssl: bool,
}

impl PowerShellExecutor {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            port: config.port,
            use_ssl: config.use_ssl,
        }
    }

    /// 把脚本包进 `Invoke-Command`
    fn wrap(&self, host: &str, script: &str) -> String {
        format!(
            r#"$ErrorActionPreference = 'Stop'
$secure = ConvertTo-SecureString $env:{password_env} -AsPlainText -Force
$credential = New-Object System.Management.Automation.PSCredential($env:{user_env}, $secure)
Invoke-Command -ComputerName {host} -Port {port}{ssl} -Credential $credential -ScriptBlock {{
{script}
}}
"#,
            password_env = PASSWORD_ENV,
            user_env = USER_ENV,
            host = quote(host),
            port = self.port,
            ssl = if self.use_ssl { " -UseSSL" } else { "" },
            script = script,
        )
    }

    async fn invoke(
        &self,
        host: &str,
        credentials: &Credentials,
        script: &str,
        timeout: Duration,
    ) -> Result<String, RemoteError> {
        let child = Command::new(&self.shell)
            .args(["-NoLogo", "-NoProfile", "-NonInteractive", "-Command"])
            .arg(self.wrap(host, script))
            .env(USER_ENV, &credentials.user)
            .env(PASSWORD_ENV, &credentials.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 超时丢弃 future 时结束子进程
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| RemoteError::Timeout(timeout.as_millis() as u64))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            if !stderr.trim().is_empty() {
                debug!(host = %host, "远程命令错误输出: {}", stderr.trim());
            }
            Ok(stdout)
        } else {
            debug!(host = %host, status = ?output.status.code(), "远程命令失败");
            Err(classify_failure(&stderr))
        }
    }
}

/// 根据错误输出区分认证、连接和脚本错误
pub fn classify_failure(stderr: &str) -> RemoteError {
    let lines: Vec<String> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    let text = stderr.to_lowercase();

    const AUTH_MARKERS: [&str; 4] = [
        "access is denied",
        "logon failure",
        "user name or password",
        "unauthorized",
    ];
    const CONNECT_MARKERS: [&str; 5] = [
        "winrm",
        "connecting to remote server",
        "cannot connect",
        "network path was not found",
        "cannot be resolved",
    ];

    let summary = lines.first().cloned().unwrap_or_else(|| "no output".to_string());
    if AUTH_MARKERS.iter().any(|m| text.contains(m)) {
        RemoteError::Auth(summary)
    } else if CONNECT_MARKERS.iter().any(|m| text.contains(m)) {
        RemoteError::Connect(summary)
    } else {
        RemoteError::Script(lines)
    }
}

#[async_trait]
impl RemoteExecutor for PowerShellExecutor {
    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
        options: &RemoteOptions,
    ) -> Result<Box<dyn RemoteSession>, RemoteError> {
        info!(host = %host, user = %credentials.user, "建立远程会话");
        let probe = self
            .invoke(host, credentials, "$env:COMPUTERNAME", options.open_timeout)
            .await?;
        debug!(host = %host, remote = %probe.trim(), "远程会话已建立");

        Ok(Box::new(PowerShellSession {
            executor: self.clone(),
            host: host.to_string(),
            credentials: credentials.clone(),
            operation_timeout: options.operation_timeout,
            closed: false,
        }))
    }
}

/// 无状态会话：每次执行独立调用 `Invoke-Command`
pub struct PowerShellSession {
    executor: PowerShellExecutor,
    host: String,
    credentials: Credentials,
    operation_timeout: Duration,
    closed: bool,
}

#[async_trait]
impl RemoteSession for PowerShellSession {
    async fn run(&mut self, script: &str) -> Result<String, RemoteError> {
        if self.closed {
            return Err(RemoteError::Connect("session already closed".to_string()));
        }
        self.executor
            .invoke(&self.host, &self.credentials, script, self.operation_timeout)
            .await
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!(host = %self.host, "关闭远程会话");
        }
    }
}
