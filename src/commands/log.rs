//! 日志相关命令

use crate::logging::LogConfig;
use crate::AppState;

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// 读取并按需修改日志配置，未给出的字段保持不变
pub fn update_log_config(
    state: &AppState,
    enabled: Option<bool>,
    max_size_mb: Option<u32>,
    level: Option<String>,
) -> Result<LogConfig, String> {
    let mut config = LogConfig::load(&state.config_dir);
    if enabled.is_none() && max_size_mb.is_none() && level.is_none() {
        return Ok(config);
    }

    if let Some(e) = enabled {
        config.enabled = e;
    }
    if let Some(size) = max_size_mb {
        // 1-100 MB
        config.max_size_mb = size.clamp(1, 100);
    }
    if let Some(l) = level {
        let l = l.to_lowercase();
        if !VALID_LEVELS.contains(&l.as_str()) {
            return Err(format!("无效的日志级别: {}", l));
        }
        config.level = l;
    }

    config.save(&state.config_dir).map_err(|e| e.to_string())?;
    tracing::info!("日志配置已更新: {:?}", config);
    Ok(config)
}
