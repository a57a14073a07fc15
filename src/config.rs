//! 应用配置模块

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// 扫描配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerConfig {
    /// 元数据并发读取上限
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,
    /// 默认文件匹配模式
    #[serde(default = "default_pattern")]
    pub default_pattern: String,
    /// 本地扫描总超时（毫秒），0 表示不限制
    #[serde(default)]
    pub scan_timeout_ms: u64,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// 远程执行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    /// 建立会话超时（毫秒）
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
    /// 单次远程操作超时（毫秒）
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub use_ssl: bool,
    /// 本机 PowerShell 可执行文件
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_max_concurrent_reads() -> usize {
    8
}

fn default_pattern() -> String {
    crate::models::DEFAULT_PATTERN.to_string()
}

fn default_open_timeout_ms() -> u64 {
    10_000
}

fn default_operation_timeout_ms() -> u64 {
    60_000
}

fn default_port() -> u16 {
    5985 // WinRM HTTP
}

fn default_shell() -> String {
    "pwsh".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            open_timeout_ms: default_open_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            port: default_port(),
            use_ssl: false,
            shell: default_shell(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: default_max_concurrent_reads(),
            default_pattern: default_pattern(),
            scan_timeout_ms: 0,
            remote: RemoteConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// 从配置文件加载扫描配置
    pub fn load(config_dir: &Path) -> Self {
        let config_file = config_dir.join("config.json");
        let loaded = fs::read_to_string(&config_file)
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|config| config.get("scanner").cloned())
            .and_then(|scanner| serde_json::from_value::<ScannerConfig>(scanner).ok());

        match loaded {
            Some(config) => config,
            None => {
                tracing::debug!("未找到扫描配置，使用默认值: {:?}", config_file);
                Self::default()
            }
        }
    }

    /// 保存扫描配置，保留文件中其他键
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        let config_file = config_dir.join("config.json");

        // 读取现有配置
        let mut config: serde_json::Value = if config_file.exists() {
            let content = fs::read_to_string(&config_file)?;
            serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        config["scanner"] = serde_json::to_value(self).map_err(io::Error::other)?;

        let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
        fs::write(&config_file, content)
    }

    /// 本地扫描期限
    pub fn scan_deadline(&self) -> Option<Duration> {
        (self.scan_timeout_ms > 0).then(|| Duration::from_millis(self.scan_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScannerConfig::load(dir.path());
        assert_eq!(config, ScannerConfig::default());
        assert_eq!(config.max_concurrent_reads, 8);
        assert_eq!(config.remote.port, 5985);
        assert_eq!(config.scan_deadline(), None);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"scanner":{"maxConcurrentReads":2,"remote":{"operationTimeoutMs":500}}}"#,
        )
        .unwrap();

        let config = ScannerConfig::load(dir.path());
        assert_eq!(config.max_concurrent_reads, 2);
        assert_eq!(config.default_pattern, "*.exe");
        assert_eq!(config.remote.operation_timeout_ms, 500);
        assert_eq!(config.remote.open_timeout_ms, 10_000);
    }

    #[test]
    fn test_save_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"log":{"level":"debug"}}"#,
        )
        .unwrap();

        let config = ScannerConfig {
            scan_timeout_ms: 1500,
            ..Default::default()
        };
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap())
                .unwrap();
        assert_eq!(raw["log"]["level"], "debug");
        assert_eq!(raw["scanner"]["scanTimeoutMs"], 1500);
        assert_eq!(
            ScannerConfig::load(dir.path()).scan_deadline(),
            Some(Duration::from_millis(1500))
        );
    }
}
