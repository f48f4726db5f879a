//! Request/response wire types and draft validation.
//!
//! The generator returns a [`LessonDraft`] — the raw wire shape without an
//! ID. Validation promotes a draft into a [`Lesson`], assigning the ID and
//! focus label locally; anything malformed becomes
//! [`GeneratorError::InvalidFormat`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use mentor_core::context::StructuredContext;
use mentor_core::ids::LessonId;
use mentor_core::lesson::{Lesson, LessonBody, PracticeQuestion};

use crate::errors::{GeneratorError, GeneratorResult};

/// Which generation model tier to call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpeed {
    /// Interactive path — low latency.
    #[default]
    Fast,
    /// Background path — higher quality, slower.
    Slow,
}

impl ModelSpeed {
    /// Stable string form for logging and metrics labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }
}

/// A lesson generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRequest {
    /// Subject being studied.
    pub subject: String,
    /// `"Topic > Subtopic"` focus label.
    pub topic_label: String,
    /// Compact personalization context.
    pub context: StructuredContext,
    /// Model tier.
    pub model_speed: ModelSpeed,
}

/// A path synthesis request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRequest {
    /// Subject to build a path for.
    pub subject: String,
    /// Course the subject belongs to.
    pub course: String,
    /// Free-text curriculum outline.
    pub outline: String,
    /// Rough mastery estimate (e.g. `"beginner"`, `"band 2"`).
    pub mastery_estimate: String,
    /// Pace note (e.g. `"moving quickly"`).
    pub pace_note: String,
}

/// Raw generated lesson before validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonDraft {
    /// Lesson title.
    pub title: String,
    /// Core explanation text.
    pub explanation: String,
    /// Optional worked example.
    pub example: Option<String>,
    /// Optional practice question.
    pub question: Option<QuestionDraft>,
    /// Generator's suggestion for what comes next.
    pub next_topic_hint: Option<String>,
}

/// Raw practice question before validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionDraft {
    /// Question prompt.
    pub prompt: String,
    /// Answer choices.
    pub choices: Vec<String>,
    /// Index of the correct choice.
    pub answer_index: usize,
    /// Optional hint.
    pub hint: Option<String>,
}

/// Validate a draft and promote it to a [`Lesson`] for the given focus label.
///
/// # Errors
///
/// [`GeneratorError::InvalidFormat`] when the title or explanation is empty,
/// or a question has out-of-range structure.
pub fn validate_draft(draft: LessonDraft, topic_label: &str) -> GeneratorResult<Lesson> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(GeneratorError::InvalidFormat {
            message: "empty title".into(),
        });
    }
    let explanation = draft.explanation.trim();
    if explanation.is_empty() {
        return Err(GeneratorError::InvalidFormat {
            message: "empty explanation".into(),
        });
    }

    let question = draft
        .question
        .map(|q| -> GeneratorResult<PracticeQuestion> {
            if q.prompt.trim().is_empty() {
                return Err(GeneratorError::InvalidFormat {
                    message: "empty question prompt".into(),
                });
            }
            if q.choices.len() < 2 || q.choices.len() > 6 {
                return Err(GeneratorError::InvalidFormat {
                    message: format!("question has {} choices, need 2-6", q.choices.len()),
                });
            }
            if q.answer_index >= q.choices.len() {
                return Err(GeneratorError::InvalidFormat {
                    message: format!(
                        "answer index {} out of range for {} choices",
                        q.answer_index,
                        q.choices.len()
                    ),
                });
            }
            Ok(PracticeQuestion {
                prompt: q.prompt,
                choices: q.choices,
                answer_index: q.answer_index,
                hint: q.hint,
            })
        })
        .transpose()?;

    Ok(Lesson {
        id: LessonId::new(),
        title: title.to_owned(),
        topic_label: topic_label.to_owned(),
        body: LessonBody {
            explanation: explanation.to_owned(),
            example: draft.example.filter(|e| !e.trim().is_empty()),
            question,
        },
        created_at: Utc::now(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
