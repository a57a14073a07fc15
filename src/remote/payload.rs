//! 远程扫描结果解析
//!
//! 顶层可以是空输出、`[]`、单个对象或对象数组。字段缺失或为 null 时取默认值
//! （数字 0、文本为空、时间 `0001-01-01T00:00:00`），单条记录解析失败只跳过该记录。

use crate::core::size::format_size;
use crate::error::{Result, ScanError};
use crate::models::{unknown_timestamp, FileRecord, FileVersion, VersionInfo};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const REMOTE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// 远程脚本输出的单条记录
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteFileEntry {
    pub name: Option<String>,
    pub full_path: Option<String>,
    pub relative_path: Option<String>,
    pub size_bytes: Option<u64>,
    pub size_display: Option<String>,
    pub last_modified: Option<String>,
    pub file_major_part: Option<u32>,
    pub file_minor_part: Option<u32>,
    pub file_build_part: Option<u32>,
    pub file_private_part: Option<u32>,
    pub file_description: Option<String>,
    pub company_name: Option<String>,
    pub product_name: Option<String>,
}

impl RemoteFileEntry {
    /// 转换为 [`FileRecord`]，文件名为空视为无效记录
    pub fn into_record(self, host: &str) -> Result<FileRecord> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ScanError::RemoteRecordParse("record without Name".to_string()))?;

        let size_bytes = self.size_bytes.unwrap_or(0);
        if let Some(remote_display) = &self.size_display {
            let local_display = format_size(size_bytes);
            if *remote_display != local_display {
                debug!(
                    file = %name,
                    remote = %remote_display,
                    local = %local_display,
                    "远程大小显示不一致，使用本地结果"
                );
            }
        }

        let info = VersionInfo {
            version: FileVersion::new(
                self.file_major_part.unwrap_or(0),
                self.file_minor_part.unwrap_or(0),
                self.file_build_part.unwrap_or(0),
                self.file_private_part.unwrap_or(0),
            ),
            description: self.file_description,
            company: self.company_name,
            product_name: self.product_name,
        };

        Ok(FileRecord::new(
            name,
            self.relative_path.unwrap_or_default(),
            self.full_path.unwrap_or_default(),
            size_bytes,
            parse_timestamp(self.last_modified.as_deref()),
            info,
        )
        .with_source_host(host))
    }
}

/// 无法解析的时间取最小值
fn parse_timestamp(value: Option<&str>) -> NaiveDateTime {
    value
        .map(str::trim)
        .and_then(|v| {
            REMOTE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(v, fmt).ok())
        })
        .unwrap_or_else(unknown_timestamp)
}

/// 解析结果
#[derive(Debug, Default)]
pub struct ParsedPayload {
    pub records: Vec<FileRecord>,
    /// 被跳过的无效记录数
    pub skipped: usize,
}

/// 拆出脚本打印的 `WARNING:` 行
fn split_warnings(output: &str) -> (Vec<&str>, String) {
    let mut warnings = Vec::new();
    let mut body = Vec::new();
    for line in output.lines() {
        match line.trim_start().strip_prefix("WARNING:") {
            Some(w) => warnings.push(w.trim()),
            None => body.push(line),
        }
    }
    (warnings, body.join("\n"))
}

/// 去掉警告行后解析 JSON，空输出和 `[]` 视为 null
fn parse_body(output: &str, host: &str) -> Result<Value> {
    let (warnings, body) = split_warnings(output);
    for w in warnings {
        warn!(host = %host, "远程警告: {}", w);
    }

    let body = body.trim();
    if body.is_empty() || body == "[]" {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(body).map_err(|e| {
        ScanError::Unexpected(format!(
            "remote payload is not valid JSON: {} ({})",
            e,
            truncate(body)
        ))
    })
}

fn unexpected_shape(value: &Value) -> ScanError {
    ScanError::Unexpected(format!(
        "unexpected remote payload shape: {}",
        truncate(&value.to_string())
    ))
}

fn parse_top_level(output: &str, host: &str) -> Result<Vec<Value>> {
    match parse_body(output, host)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        value @ Value::Object(_) => Ok(vec![value]),
        other => Err(unexpected_shape(&other)),
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// 解析远程扫描输出
pub fn parse_scan_payload(output: &str, host: &str) -> Result<ParsedPayload> {
    let mut parsed = ParsedPayload::default();

    for (index, item) in parse_top_level(output, host)?.into_iter().enumerate() {
        let record = serde_json::from_value::<RemoteFileEntry>(item)
            .map_err(|e| ScanError::RemoteRecordParse(format!("record {}: {}", index, e)))
            .and_then(|entry| entry.into_record(host));

        match record {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                warn!(host = %host, "跳过远程记录: {}", e);
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

/// 解析目录列表输出，单个字符串也视为一项
pub fn parse_directory_payload(output: &str, host: &str) -> Result<Vec<String>> {
    let items = match parse_body(output, host)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        dir @ Value::String(_) => vec![dir],
        other => return Err(unexpected_shape(&other)),
    };

    let mut dirs = Vec::new();
    for item in items {
        match item {
            Value::String(dir) if !dir.trim().is_empty() => dirs.push(dir),
            other => warn!(host = %host, "跳过无效目录项: {}", other),
        }
    }
    Ok(dirs)
}
