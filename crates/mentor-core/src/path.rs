//! Curriculum domain model: learning paths, cursors, and completion state.
//!
//! A [`LearningPath`] is an ordered tree of topics and subtopics created once
//! per (user, subject) and mutated only by appending or marking completion —
//! never reordered. The [`PathCursor`] points at the learner's current
//! position; the [`CompletionMap`] is the authoritative record of which
//! subtopics are finished.
//!
//! INVARIANT: the `completed` flag embedded on [`Subtopic`] is a one-time
//! migration fallback. It may seed the completion map on first load but is
//! never consulted afterwards — the map wins in every disagreement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::FOCUS_LABEL_SEPARATOR;

/// Build the `"Topic > Subtopic"` focus label for a position.
#[must_use]
pub fn focus_label(topic: &str, subtopic: &str) -> String {
    format!("{topic}{FOCUS_LABEL_SEPARATOR}{subtopic}")
}

/// A single subtopic within a topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtopic {
    /// Display name.
    pub name: String,
    /// Planned number of mini-lessons (always ≥ 1).
    pub mini_lesson_count: u32,
    /// Legacy embedded completion flag — migration seed only.
    #[serde(default)]
    pub completed: bool,
}

/// A topic: a named, ordered sequence of subtopics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Display name.
    pub name: String,
    /// Ordered subtopics.
    pub subtopics: Vec<Subtopic>,
}

/// The full curriculum tree for one (user, subject).
///
/// Ordering is stable once created; mutation only appends or marks
/// completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    /// Ordered topics.
    pub topics: Vec<Topic>,
}

impl LearningPath {
    /// Whether the path has any content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() || self.topics.iter().all(|t| t.subtopics.is_empty())
    }

    /// Look up a subtopic by position.
    #[must_use]
    pub fn subtopic_at(&self, topic_index: usize, subtopic_index: usize) -> Option<&Subtopic> {
        self.topics.get(topic_index)?.subtopics.get(subtopic_index)
    }

    /// Focus label at a position, if it exists.
    #[must_use]
    pub fn label_at(&self, topic_index: usize, subtopic_index: usize) -> Option<String> {
        let topic = self.topics.get(topic_index)?;
        let sub = topic.subtopics.get(subtopic_index)?;
        Some(focus_label(&topic.name, &sub.name))
    }

    /// Iterate all `(topic_index, subtopic_index, label)` positions in order.
    pub fn positions(&self) -> impl Iterator<Item = (usize, usize, String)> + '_ {
        self.topics.iter().enumerate().flat_map(|(ti, topic)| {
            topic
                .subtopics
                .iter()
                .enumerate()
                .map(move |(si, sub)| (ti, si, focus_label(&topic.name, &sub.name)))
        })
    }
}

/// The learner's current position within a path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathCursor {
    /// Index into `LearningPath::topics`.
    pub topic_index: usize,
    /// Index into the current topic's subtopics.
    pub subtopic_index: usize,
    /// Mini-lessons already delivered for the current subtopic.
    pub delivered_mini_count: u32,
}

impl PathCursor {
    /// Whether this cursor points inside the path bounds.
    #[must_use]
    pub fn in_bounds(&self, path: &LearningPath) -> bool {
        path.subtopic_at(self.topic_index, self.subtopic_index)
            .is_some()
    }
}

/// Authoritative completion state keyed by focus label.
///
/// Once a label is marked complete it never reverts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionMap(BTreeMap<String, bool>);

impl CompletionMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given focus label is complete.
    #[must_use]
    pub fn is_complete(&self, label: &str) -> bool {
        self.0.get(label).copied().unwrap_or(false)
    }

    /// Mark a label complete. A later `false` never undoes an earlier `true`.
    pub fn mark(&mut self, label: &str, complete: bool) {
        let entry = self.0.entry(label.to_owned()).or_insert(false);
        *entry = *entry || complete;
    }

    /// Seed from embedded subtopic flags, for labels the map doesn't know yet.
    ///
    /// One-time migration fallback: labels already present keep their value.
    pub fn seed_from_path(&mut self, path: &LearningPath) {
        for topic in &path.topics {
            for sub in &topic.subtopics {
                let label = focus_label(&topic.name, &sub.name);
                if sub.completed && !self.0.contains_key(&label) {
                    let _ = self.0.insert(label, true);
                }
            }
        }
    }

    /// Number of entries (complete or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of a cursor-advance scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Cursor unchanged — the current subtopic is still incomplete.
    Unchanged(PathCursor),
    /// Cursor moved to a new incomplete subtopic (mini count reset to 0).
    Moved(PathCursor),
    /// Every subtopic in the path is complete.
    Exhausted,
}

impl AdvanceOutcome {
    /// The cursor to use after the scan, if the path isn't exhausted.
    #[must_use]
    pub fn cursor(&self) -> Option<PathCursor> {
        match self {
            Self::Unchanged(c) | Self::Moved(c) => Some(*c),
            Self::Exhausted => None,
        }
    }
}

/// Advance the cursor to the next incomplete subtopic.
///
/// If the currently pointed-at subtopic is incomplete (per the completion
/// map), the cursor stays put. Otherwise the scan walks forward from the
/// cursor position, then wraps to a full scan from the start; the earliest
/// incomplete position wins. Moving resets `delivered_mini_count` to 0.
///
/// An out-of-bounds cursor (path shrank or was regenerated) is treated as a
/// full scan from the start.
#[must_use]
pub fn advance_cursor(
    path: &LearningPath,
    completion: &CompletionMap,
    cursor: PathCursor,
) -> AdvanceOutcome {
    if path.is_empty() {
        return AdvanceOutcome::Exhausted;
    }

    if cursor.in_bounds(path) {
        let label = path
            .label_at(cursor.topic_index, cursor.subtopic_index)
            .unwrap_or_default();
        if !completion.is_complete(&label) {
            return AdvanceOutcome::Unchanged(cursor);
        }

        // Forward scan from the position after the cursor.
        for (ti, si, label) in path.positions() {
            let ahead = ti > cursor.topic_index
                || (ti == cursor.topic_index && si > cursor.subtopic_index);
            if ahead && !completion.is_complete(&label) {
                return AdvanceOutcome::Moved(PathCursor {
                    topic_index: ti,
                    subtopic_index: si,
                    delivered_mini_count: 0,
                });
            }
        }
    }

    // Wrap: full scan from the start, earliest incomplete wins. The current
    // position can't match here — an incomplete current already returned.
    for (ti, si, label) in path.positions() {
        if !completion.is_complete(&label) {
            return AdvanceOutcome::Moved(PathCursor {
                topic_index: ti,
                subtopic_index: si,
                delivered_mini_count: 0,
            });
        }
    }

    AdvanceOutcome::Exhausted
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
