//! Generator trait and scripted mock.
//!
//! The external generation model is a collaborator, not part of this
//! service; everything behind this trait is wire plumbing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use mentor_core::path::{LearningPath, Subtopic, Topic};

use crate::errors::{GeneratorError, GeneratorResult};
use crate::types::{LessonDraft, LessonRequest, PathRequest, QuestionDraft};

/// Core generator trait.
///
/// Implementors must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a lesson draft for the request's focus label.
    async fn generate_lesson(&self, request: &LessonRequest) -> GeneratorResult<LessonDraft>;

    /// Synthesize a full learning path for a subject.
    async fn generate_path(&self, request: &PathRequest) -> GeneratorResult<LearningPath>;
}

/// Scripted mock generator for tests.
///
/// Lesson responses are consumed from a queue; when the queue is empty, a
/// deterministic draft derived from the request is produced. Path responses
/// work the same way with a three-topic default.
pub struct MockGenerator {
    lesson_script: Mutex<VecDeque<GeneratorResult<LessonDraft>>>,
    path_script: Mutex<VecDeque<GeneratorResult<LearningPath>>>,
    lesson_calls: AtomicUsize,
    path_calls: AtomicUsize,
}

impl MockGenerator {
    /// Create a mock with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lesson_script: Mutex::new(VecDeque::new()),
            path_script: Mutex::new(VecDeque::new()),
            lesson_calls: AtomicUsize::new(0),
            path_calls: AtomicUsize::new(0),
        }
    }

    /// Queue the next lesson response.
    pub fn push_lesson(&self, response: GeneratorResult<LessonDraft>) {
        self.lesson_script.lock().push_back(response);
    }

    /// Queue the next path response.
    pub fn push_path(&self, response: GeneratorResult<LearningPath>) {
        self.path_script.lock().push_back(response);
    }

    /// Number of lesson generation calls so far.
    pub fn lesson_calls(&self) -> usize {
        self.lesson_calls.load(Ordering::SeqCst)
    }

    /// Number of path synthesis calls so far.
    pub fn path_calls(&self) -> usize {
        self.path_calls.load(Ordering::SeqCst)
    }

    /// Deterministic fallback draft derived from the request.
    fn default_draft(request: &LessonRequest) -> LessonDraft {
        let n = request.context.avoid_titles.len();
        LessonDraft {
            title: format!("{} — take {}", request.topic_label, n + 1),
            explanation: format!(
                "A focused walkthrough of {} tuned for a {} pace.",
                request.topic_label,
                request.context.pace.as_str()
            ),
            example: Some("Worked example goes here.".into()),
            question: Some(QuestionDraft {
                prompt: format!("Quick check on {}", request.topic_label),
                choices: vec!["A".into(), "B".into(), "C".into()],
                answer_index: 0,
                hint: None,
            }),
            next_topic_hint: None,
        }
    }

    /// Deterministic fallback path: three topics, two subtopics each.
    fn default_path(request: &PathRequest) -> LearningPath {
        LearningPath {
            topics: (1..=3)
                .map(|t| Topic {
                    name: format!("{} Topic {t}", request.subject),
                    subtopics: (1..=2)
                        .map(|s| Subtopic {
                            name: format!("Subtopic {s}"),
                            mini_lesson_count: 3,
                            completed: false,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate_lesson(&self, request: &LessonRequest) -> GeneratorResult<LessonDraft> {
        let _ = self.lesson_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.lesson_script.lock().pop_front() {
            return scripted;
        }
        Ok(Self::default_draft(request))
    }

    async fn generate_path(&self, request: &PathRequest) -> GeneratorResult<LearningPath> {
        let _ = self.path_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.path_script.lock().pop_front() {
            return scripted;
        }
        Ok(Self::default_path(request))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
