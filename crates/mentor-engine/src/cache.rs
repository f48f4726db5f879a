//! Warm lesson cache: persona-scoped selection over the store's entries.
//!
//! Selection rule for a hit: among entries matching the current persona
//! hash, take the first (most recent) whose ID is not excluded and whose
//! embedding is not a near-duplicate of recently delivered lessons. Entries
//! failing a check are skipped, not evicted; stale-persona entries are
//! retained as replacement candidates but never served.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::debug;

use mentor_core::context::Guardrails;
use mentor_core::lesson::{CachedLesson, Lesson};
use mentor_core::text::normalize_title;
use mentor_embeddings::Deduplicator;
use mentor_settings::EngineSettings;
use mentor_store::{StateStore, TopicKey};

use crate::errors::EngineResult;

/// Persona-aware cache selector.
pub struct LessonCache {
    store: Arc<StateStore>,
    dedup: Deduplicator,
    settings: EngineSettings,
}

impl LessonCache {
    /// Create a new cache selector.
    pub fn new(store: Arc<StateStore>, dedup: Deduplicator, settings: EngineSettings) -> Self {
        Self {
            store,
            dedup,
            settings,
        }
    }

    /// Find a servable cache hit for the current persona.
    pub fn find_hit(
        &self,
        key: &TopicKey,
        persona_hash: &str,
        guardrails: &Guardrails,
        recent_embeddings: &[Vec<f32>],
    ) -> EngineResult<Option<CachedLesson>> {
        let entries = self.store.get_lesson_cache(
            key,
            self.settings.cache_max_age_hours,
            Utc::now(),
        )?;

        for entry in entries {
            if entry.persona_hash != persona_hash {
                continue;
            }
            let normalized = normalize_title(&entry.lesson.title);
            if guardrails.excludes(entry.lesson.id.as_str(), &normalized) {
                debug!(lesson_id = %entry.lesson.id, "cache entry excluded, skipping");
                continue;
            }
            let verdict = self
                .dedup
                .check(entry.embedding.as_deref(), recent_embeddings);
            if !verdict.is_acceptable() {
                debug!(lesson_id = %entry.lesson.id, "cache entry near-duplicate, skipping");
                continue;
            }
            counter!("lesson_cache_hits_total").increment(1);
            return Ok(Some(entry));
        }

        counter!("lesson_cache_misses_total").increment(1);
        Ok(None)
    }

    /// Cache a freshly generated lesson.
    pub fn store_generated(
        &self,
        key: &TopicKey,
        lesson: &Lesson,
        persona_hash: &str,
        embedding: Option<Vec<f32>>,
        next_topic_hint: Option<String>,
    ) -> EngineResult<()> {
        let entry = CachedLesson {
            lesson: lesson.clone(),
            cached_at: Utc::now(),
            persona_hash: persona_hash.to_owned(),
            embedding,
            next_topic_hint,
        };
        self.store
            .put_lesson_cache(key, &entry, self.settings.cache_cap)?;
        Ok(())
    }

    /// Refresh the recency of a just-served entry.
    pub fn touch(&self, key: &TopicKey, lesson_id: &str) -> EngineResult<()> {
        self.store.touch_lesson_cache(key, lesson_id, Utc::now())?;
        Ok(())
    }

    /// Additional non-excluded entries for prefetch, skipping one served ID.
    pub fn prefetch_candidates(
        &self,
        key: &TopicKey,
        persona_hash: &str,
        guardrails: &Guardrails,
        exclude_lesson_id: &str,
        limit: usize,
    ) -> EngineResult<Vec<Lesson>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let entries = self.store.get_lesson_cache(
            key,
            self.settings.cache_max_age_hours,
            Utc::now(),
        )?;
        Ok(entries
            .into_iter()
            .filter(|e| e.persona_hash == persona_hash)
            .filter(|e| e.lesson.id.as_str() != exclude_lesson_id)
            .filter(|e| {
                !guardrails.excludes(e.lesson.id.as_str(), &normalize_title(&e.lesson.title))
            })
            .take(limit)
            .map(|e| e.lesson)
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
