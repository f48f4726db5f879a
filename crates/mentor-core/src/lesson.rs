//! Lesson payload types and their delivery-lifecycle wrappers.
//!
//! - [`Lesson`]: the generated content served to a learner
//! - [`CachedLesson`]: a lesson held in the per-topic warm cache
//! - [`PendingLesson`]: a pre-generated lesson awaiting consumption
//! - [`DeliveredLesson`]: a compact record of a past delivery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LessonId;

/// A multiple-choice practice question attached to a lesson.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestion {
    /// Question prompt.
    pub prompt: String,
    /// Answer choices (2–6 entries).
    pub choices: Vec<String>,
    /// Index of the correct choice.
    pub answer_index: usize,
    /// Optional hint shown on a wrong answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// The teachable body of a lesson.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonBody {
    /// Core explanation text.
    pub explanation: String,
    /// Worked example, when the generator produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Practice question, when the generator produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<PracticeQuestion>,
}

/// A fully generated micro-lesson.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Unique lesson ID.
    pub id: LessonId,
    /// Display title.
    pub title: String,
    /// `"Topic > Subtopic"` label this lesson was generated for.
    pub topic_label: String,
    /// Lesson content.
    pub body: LessonBody,
    /// ISO 8601 creation time.
    pub created_at: DateTime<Utc>,
}

/// A lesson held in the warm per-topic cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLesson {
    /// The cached lesson payload.
    pub lesson: Lesson,
    /// When the entry was cached.
    pub cached_at: DateTime<Utc>,
    /// Persona fingerprint at generation time.
    pub persona_hash: String,
    /// Content embedding, when the embedding service was reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Label of the next incomplete subtopic at generation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_topic_hint: Option<String>,
}

impl CachedLesson {
    /// Whether this entry has outlived the cache max age.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, max_age_hours: i64) -> bool {
        now.signed_duration_since(self.cached_at) > chrono::Duration::hours(max_age_hours)
    }
}

/// A pre-generated lesson queued for later consumption.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLesson {
    /// FIFO sequence number assigned by the store.
    pub seq: i64,
    /// The pending lesson payload.
    pub lesson: Lesson,
    /// Persona fingerprint at generation time.
    pub persona_hash: String,
    /// Content embedding, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// When the lesson was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

/// A compact record of a delivered lesson, kept per topic label.
///
/// Used for exclusion and descriptive context, never for ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredLesson {
    /// Delivered lesson ID.
    pub lesson_id: LessonId,
    /// Delivered lesson title.
    pub title: String,
    /// Content embedding captured at delivery time, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Delivery time.
    pub delivered_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
