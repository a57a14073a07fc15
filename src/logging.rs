//! 日志模块 - 文件日志与大小轮转

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "versionscan.log";

/// 日志配置，存放在 config.json 的 `log` 键下
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 单个日志文件上限（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// "error" / "warn" / "info" / "debug" / "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    pub fn load(config_dir: &Path) -> Self {
        fs::read_to_string(config_dir.join("config.json"))
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|config| config.get("log").cloned())
            .and_then(|log| serde_json::from_value::<LogConfig>(log).ok())
            .unwrap_or_default()
    }

    /// 保存日志配置，保留文件中的其它键
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        let config_file = config_dir.join("config.json");
        let mut config = fs::read_to_string(&config_file)
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .filter(|v| v.is_object())
            .unwrap_or_else(|| serde_json::json!({}));

        config["log"] = serde_json::to_value(self).map_err(io::Error::other)?;
        let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
        fs::write(&config_file, content)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

struct LogFile {
    writer: BufWriter<File>,
    written: u64,
}

/// 超过大小上限时把当前日志改名为 `.old` 再重新打开
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    state: Arc<Mutex<LogFile>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE);
        let max_size = u64::from(max_size_mb) * 1024 * 1024;
        let state = Self::open(&file_path, max_size)?;

        Ok(Self {
            file_path,
            max_size,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn open(file_path: &Path, max_size: u64) -> io::Result<LogFile> {
        let existing = fs::metadata(file_path).map(|m| m.len()).unwrap_or(0);
        if existing > max_size {
            Self::rotate(file_path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(LogFile {
            writer: BufWriter::new(file),
            written,
        })
    }

    fn rotate(file_path: &Path) -> io::Result<()> {
        let backup = file_path.with_extension("log.old");
        if backup.exists() {
            fs::remove_file(&backup)?;
        }
        fs::rename(file_path, &backup)
    }

    fn lock(&self) -> MutexGuard<'_, LogFile> {
        // 写日志时 panic 不应让后续日志全部丢失
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_locked(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        let n = state.writer.write(buf)?;
        state.writer.flush()?;
        state.written += n as u64;

        if state.written > self.max_size {
            state.writer.flush()?;
            Self::rotate(&self.file_path)?;
            *state = Self::open(&self.file_path, self.max_size)?;
        }
        Ok(n)
    }
}

/// `MakeWriter` 为每条事件生成的句柄
pub struct LogWriter {
    inner: SizeRotatingWriter,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_locked(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().writer.flush()
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.clone(),
        }
    }
}

/// 构建过滤器：RUST_LOG 非空且可解析时优先，否则用配置里的级别
pub fn env_filter(config: &LogConfig, rust_log: Option<&str>) -> EnvFilter {
    let fallback = || EnvFilter::default().add_directive(config.tracing_level().into());
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|e| {
            eprintln!("忽略无效的 RUST_LOG ({}): {}", directives, e);
            fallback()
        }),
        None => fallback(),
    }
}

/// 日志目录（跟随配置目录）
pub fn get_log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}
