//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Each section is marked with
//! `#[serde(default)]` so partial JSON files only override the fields they
//! name.

use serde::{Deserialize, Serialize};

/// Root settings type for the Mentor service.
///
/// Loaded from `~/.mentor/settings.json` with defaults applied for missing
/// fields. `MENTOR_*` environment variables override specific values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentorSettings {
    /// Settings schema version.
    pub version: String,
    /// Server network settings.
    pub server: ServerSettings,
    /// Persistent store settings.
    pub store: StoreSettings,
    /// External lesson generator settings.
    pub generator: GeneratorSettings,
    /// External embedding service settings.
    pub embeddings: EmbeddingSettings,
    /// Delivery engine tuning.
    pub engine: EngineSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for MentorSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            store: StoreSettings::default(),
            generator: GeneratorSettings::default(),
            embeddings: EmbeddingSettings::default(),
            engine: EngineSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind (0 for auto-assign).
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8470,
        }
    }
}

/// Persistent store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite database path (empty = `~/.mentor/database/mentor.db`).
    pub db_path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            pool_size: 16,
            busy_timeout_ms: 30_000,
        }
    }
}

/// External lesson generator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorSettings {
    /// Base URL of the generation service.
    pub base_url: String,
    /// API key, when the service requires one.
    pub api_key: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Model identifier for fast (interactive) generation.
    pub fast_model: String,
    /// Model identifier for slow (background) generation.
    pub slow_model: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8600".into(),
            api_key: String::new(),
            timeout_secs: 30,
            fast_model: "lesson-fast-1".into(),
            slow_model: "lesson-deep-1".into(),
        }
    }
}

/// External embedding service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Base URL of the embedding service.
    pub base_url: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Expected vector dimensions.
    pub dims: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8601".into(),
            timeout_secs: 10,
            dims: 512,
        }
    }
}

/// Delivery engine tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Cached lessons kept per (user, subject, topic label).
    pub cache_cap: usize,
    /// Cache entry max age in hours (expires regardless of slot pressure).
    pub cache_max_age_hours: i64,
    /// Cosine similarity above which a candidate is a near-duplicate.
    pub similarity_threshold: f32,
    /// Delivered embeddings compared against a candidate.
    pub recent_embedding_window: usize,
    /// Pending queue depth per (user, subject).
    pub pending_depth: usize,
    /// Hours of history counted toward pace.
    pub pace_window_hours: i64,
    /// Attempts within the pace window above which pace is fast.
    pub pace_fast_threshold: usize,
    /// Delivered-lesson records retained per topic label.
    pub delivery_retention: usize,
    /// Preference entries retained per kind.
    pub preference_retention: usize,
    /// Recent titles handed to the generator to avoid verbatim repeats.
    pub avoid_title_count: usize,
    /// Style cues included in the structured context.
    pub style_cue_count: usize,
    /// Character budget per knowledge fragment field.
    pub knowledge_char_budget: usize,
    /// Timeout for a live generation call in seconds.
    pub generation_timeout_secs: u64,
    /// Suggested client retry delay for `Generating` responses, in seconds.
    pub retry_after_secs: u64,
    /// Path-synthesis lock lease in seconds.
    pub lock_lease_secs: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_cap: 5,
            cache_max_age_hours: 72,
            similarity_threshold: 0.85,
            recent_embedding_window: 10,
            pending_depth: 2,
            pace_window_hours: 72,
            pace_fast_threshold: 8,
            delivery_retention: 20,
            preference_retention: 25,
            avoid_title_count: 3,
            style_cue_count: 3,
            knowledge_char_budget: 160,
            generation_timeout_secs: 30,
            retry_after_secs: 3,
            lock_lease_secs: 60,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON-formatted log lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
