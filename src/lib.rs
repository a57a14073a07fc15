use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;
pub mod remote;
pub mod storage;

pub use config::ScannerConfig;
pub use error::{ErrorKind, ScanError};
pub use models::{ComparisonResult, FileRecord, ScanRequest, ScanResult};

use crate::core::{ComparisonOrchestrator, LocalScanner, RemoteScanEngine};
use remote::{PowerShellExecutor, RemoteExecutor, RemoteOptions};
use storage::{FileSystem, LocalFileSystem, PeVersionReader, VersionReader};

/// 应用状态，在各命令间共享
#[derive(Clone)]
pub struct AppState {
    pub config_dir: PathBuf,
    pub config: ScannerConfig,
    pub fs: Arc<dyn FileSystem>,
    pub versions: Arc<dyn VersionReader>,
    pub executor: Arc<dyn RemoteExecutor>,
    /// 全局取消信号，命令使用其子令牌
    pub cancel: CancellationToken,
}

impl AppState {
    /// 使用本地文件系统和 PowerShell 执行器
    pub fn new(config_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => default_config_dir(),
        };
        std::fs::create_dir_all(&config_dir)?;

        let config = ScannerConfig::load(&config_dir);
        let executor = Arc::new(PowerShellExecutor::new(&config.remote));
        Ok(Self::with_capabilities(
            config_dir,
            config,
            Arc::new(LocalFileSystem::new()),
            Arc::new(PeVersionReader),
            executor,
        ))
    }

    pub fn with_capabilities(
        config_dir: PathBuf,
        config: ScannerConfig,
        fs: Arc<dyn FileSystem>,
        versions: Arc<dyn VersionReader>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Self {
        Self {
            config_dir,
            config,
            fs,
            versions,
            executor,
            cancel: CancellationToken::new(),
        }
    }

    pub fn local_scanner(&self) -> LocalScanner {
        LocalScanner::new(self.fs.clone(), self.versions.clone())
            .with_max_concurrent(self.config.max_concurrent_reads)
            .with_deadline(self.config.scan_deadline())
    }

    pub fn remote_engine(&self) -> RemoteScanEngine {
        RemoteScanEngine::new(
            self.executor.clone(),
            RemoteOptions::from_config(&self.config.remote),
        )
    }

    pub fn orchestrator(&self, pattern: Option<&str>) -> ComparisonOrchestrator {
        ComparisonOrchestrator::new(self.fs.clone(), self.local_scanner())
            .with_remote(self.remote_engine())
            .with_pattern(pattern.unwrap_or(&self.config.default_pattern))
    }

    /// 取消所有进行中的命令
    pub fn cleanup(&self) {
        tracing::info!("正在取消进行中的扫描...");
        self.cancel.cancel();
    }
}

/// 默认配置目录，可被其中 config.json 的 `data_path` 覆盖
pub fn default_config_dir() -> PathBuf {
    let default_config_dir = dirs::config_dir()
        .map(|p| p.join("versionscan"))
        .unwrap_or_else(|| PathBuf::from(".versionscan"));

    let config_file = default_config_dir.join("config.json");
    std::fs::read_to_string(&config_file)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|config| config.get("data_path")?.as_str().map(PathBuf::from))
        .filter(|p| p.is_dir())
        .inspect(|p| tracing::debug!("使用自定义数据路径: {:?}", p))
        .unwrap_or(default_config_dir)
}

pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }
    }
}
