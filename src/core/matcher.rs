//! 按规范化名称配对 current / future 两侧的版本目录

use crate::models::{DirectoryPair, FolderMatch};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// 构建时间戳后缀，例如 `-20240601T000000Z-1-1`
static BUILD_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d{8}T\d{6}Z-\d+-\d+$").expect("valid suffix regex"));

/// 目录的比较键：最后一级目录名去掉构建后缀，转小写并去空白
pub fn normalize_folder_name(dir: &str) -> String {
    let name = folder_name(dir);
    let stripped = BUILD_SUFFIX.replace(name.trim(), "");
    stripped.to_lowercase().trim().to_string()
}

fn folder_name(dir: &str) -> &str {
    let trimmed = dir.trim_end_matches(['/', '\\']);
    let by_std = Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(trimmed);
    // 远程路径在 unix 上运行时也是反斜杠
    by_std.rsplit('\\').next().unwrap_or(by_std)
}

/// 每个 current 目录与第一个同键的 future 目录配对。
/// 结果按 `current` 顺序，重复键的后续目录不再配对。
pub fn match_folders(current: &[String], future: &[String]) -> FolderMatch {
    let future_keys: Vec<String> = future.iter().map(|f| normalize_folder_name(f)).collect();

    let mut pairs = Vec::new();
    let mut current_only = Vec::new();
    let mut current_keys = HashSet::new();

    for dir in current {
        let key = normalize_folder_name(dir);
        match future_keys.iter().position(|k| *k == key) {
            Some(idx) => {
                debug!(current = %dir, future = %future[idx], key = %key, "folder pair");
                pairs.push(DirectoryPair {
                    current_path: dir.clone(),
                    future_path: future[idx].clone(),
                });
            }
            None => current_only.push(dir.clone()),
        }
        current_keys.insert(key);
    }

    let future_only = future
        .iter()
        .zip(&future_keys)
        .filter(|(_, key)| !current_keys.contains(*key))
        .map(|(dir, _)| dir.clone())
        .collect();

    FolderMatch {
        pairs,
        current_only,
        future_only,
    }
}
