//! The compact context contract between the engine and the generator.
//!
//! [`StructuredContext`] is everything the generator is allowed to see —
//! small, size-bounded, personalization-bearing. [`Guardrails`] is the local
//! exclusion state used to filter candidates after the fact; it is NEVER
//! serialized into a generation request. Keeping exclusions out of the
//! prompt keeps the payload small; repeat-protection is enforced locally.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::progress::Pace;

/// A compressed knowledge fragment about the current focus.
///
/// Each field is truncated to a fixed character budget before it gets here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeFragment {
    /// What the concept is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Where it gets used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// What it builds on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerequisite: Option<String>,
    /// A nudge about prior work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<String>,
}

/// The size-bounded context object sent to the generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContext {
    /// Current `"Topic > Subtopic"` focus label.
    pub focus_label: String,
    /// Learning pace.
    pub pace: Pace,
    /// Accuracy percentage, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_pct: Option<u8>,
    /// Compressed knowledge fragment for the focus.
    pub knowledge: KnowledgeFragment,
    /// Up to a handful of style cues (e.g. `"stepwise"`, `"stretch"`).
    pub style_cues: Vec<String>,
    /// Recent lesson titles the generator should not repeat verbatim.
    pub avoid_titles: Vec<String>,
}

/// Local post-generation filtering state. Never sent to the generator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Guardrails {
    /// Lesson IDs that must not be served again.
    pub exclude_ids: HashSet<String>,
    /// Normalized titles that must not be served again.
    pub exclude_titles: HashSet<String>,
}

impl Guardrails {
    /// Whether a lesson ID or normalized title is excluded.
    #[must_use]
    pub fn excludes(&self, lesson_id: &str, normalized_title: &str) -> bool {
        self.exclude_ids.contains(lesson_id) || self.exclude_titles.contains(normalized_title)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
