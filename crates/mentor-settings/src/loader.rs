//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MentorSettings::default()`]
//! 2. If `~/.mentor/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::MentorSettings;

/// Resolve the path to the settings file (`~/.mentor/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".mentor").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MentorSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<MentorSettings> {
    let defaults = serde_json::to_value(MentorSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MentorSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut MentorSettings) {
    if let Some(v) = read_env_string("MENTOR_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("MENTOR_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("MENTOR_DB_PATH") {
        settings.store.db_path = v;
    }
    if let Some(v) = read_env_string("MENTOR_GENERATOR_URL") {
        settings.generator.base_url = v;
    }
    if let Some(v) = read_env_string("MENTOR_GENERATOR_API_KEY") {
        settings.generator.api_key = v;
    }
    if let Some(v) = read_env_u64("MENTOR_GENERATOR_TIMEOUT_SECS", 1, 600) {
        settings.generator.timeout_secs = v;
    }
    if let Some(v) = read_env_string("MENTOR_EMBEDDINGS_URL") {
        settings.embeddings.base_url = v;
    }
    if let Some(v) = read_env_usize("MENTOR_PENDING_DEPTH", 1, 16) {
        settings.engine.pending_depth = v;
    }
    if let Some(v) = read_env_usize("MENTOR_CACHE_CAP", 1, 64) {
        settings.engine.cache_cap = v;
    }
    if let Some(v) = read_env_string("MENTOR_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_objects_recursively() {
        let target = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = json!({"a": {"y": 9}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"a": {"x": 1, "y": 9}, "b": 3}));
    }

    #[test]
    fn deep_merge_null_preserves_target() {
        let target = json!({"a": 1, "b": 2});
        let source = json!({"a": null, "b": 7});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"a": 1, "b": 7}));
    }

    #[test]
    fn deep_merge_arrays_replaced() {
        let target = json!({"list": [1, 2, 3]});
        let source = json!({"list": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"list": [9]}));
    }

    #[test]
    fn deep_merge_new_keys_added() {
        let target = json!({"a": 1});
        let source = json!({"b": 2});
        assert_eq!(deep_merge(target, source), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.engine.cache_cap, 5);
    }

    #[test]
    fn load_merges_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"engine": {"pendingDepth": 4}, "server": {"port": 9000}}"#)
            .unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.engine.pending_depth, 4);
        assert_eq!(settings.server.port, 9000);
        // Untouched fields keep defaults.
        assert_eq!(settings.engine.cache_cap, 5);
    }

    #[test]
    fn load_invalid_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn parse_u16_range_bounds() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("abc", 1, 65535), None);
    }

    #[test]
    fn parse_usize_range_bounds() {
        assert_eq!(parse_usize_range("3", 1, 16), Some(3));
        assert_eq!(parse_usize_range("17", 1, 16), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("30", 1, 600), Some(30));
        assert_eq!(parse_u64_range("601", 1, 600), None);
    }
}
