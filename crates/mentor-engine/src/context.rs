//! Context assembly: the compact payload for the generator, plus local
//! guardrails.
//!
//! The structured context is deliberately small — a focus label, pace,
//! accuracy, a truncated knowledge fragment, a few style cues, and a few
//! recent titles. Exclusion lists stay OUT of the generator payload;
//! repeat-protection is enforced locally by guardrail filtering and the
//! deduplicator after the fact.

use mentor_core::context::{Guardrails, KnowledgeFragment, StructuredContext};
use mentor_core::lesson::DeliveredLesson;
use mentor_core::progress::{Pace, PreferenceSet, ProgressSnapshot, accuracy_band};
use mentor_core::text::{normalize_title, truncate_chars};
use mentor_settings::EngineSettings;
use mentor_store::{PathStateRecord, StateKey, StateStore, TopicKey};

use crate::errors::EngineResult;
use crate::persona::persona_for;

/// Inputs for one assembly pass.
pub struct AssembleInputs<'a> {
    /// Current `"Topic > Subtopic"` focus label.
    pub focus_label: &'a str,
    /// Course the subject belongs to.
    pub course: &'a str,
    /// Curriculum outline text (source of the knowledge fragment).
    pub outline: &'a str,
    /// Name of the previous subtopic in the path, if any.
    pub previous_subtopic: Option<&'a str>,
    /// Current progress snapshot.
    pub snapshot: &'a ProgressSnapshot,
    /// Recent tone tags, most-recent-first.
    pub tone_tags: &'a [String],
    /// Delivery history for the focus label, most recent first.
    pub deliveries: &'a [DeliveredLesson],
    /// Learner preference lists.
    pub preferences: &'a PreferenceSet,
}

/// Context assembler with fixed budgets.
pub struct ContextAssembler {
    settings: EngineSettings,
}

impl ContextAssembler {
    /// Create a new assembler.
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Build the structured context and guardrails for a delivery.
    #[must_use]
    pub fn assemble(&self, inputs: &AssembleInputs<'_>) -> (StructuredContext, Guardrails) {
        let context = StructuredContext {
            focus_label: inputs.focus_label.to_owned(),
            pace: inputs.snapshot.pace,
            accuracy_pct: inputs.snapshot.accuracy_pct,
            knowledge: self.knowledge_fragment(inputs),
            style_cues: self.style_cues(inputs.snapshot, inputs.tone_tags),
            avoid_titles: inputs
                .deliveries
                .iter()
                .take(self.settings.avoid_title_count)
                .map(|d| d.title.clone())
                .collect(),
        };

        let mut guardrails = Guardrails::default();
        for delivered in inputs.deliveries {
            let _ = guardrails
                .exclude_ids
                .insert(delivered.lesson_id.as_str().to_owned());
            let _ = guardrails
                .exclude_titles
                .insert(normalize_title(&delivered.title));
        }
        for disliked in &inputs.preferences.disliked {
            let _ = guardrails.exclude_ids.insert(disliked.as_str().to_owned());
        }

        (context, guardrails)
    }

    fn knowledge_fragment(&self, inputs: &AssembleInputs<'_>) -> KnowledgeFragment {
        let budget = self.settings.knowledge_char_budget;
        let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };

        KnowledgeFragment {
            definition: non_empty(truncate_chars(inputs.outline, budget)),
            application: non_empty(truncate_chars(
                &format!("Part of {}", inputs.course),
                budget,
            )),
            prerequisite: inputs
                .previous_subtopic
                .map(|p| truncate_chars(p, budget))
                .and_then(non_empty),
            reminder: inputs
                .deliveries
                .first()
                .map(|d| truncate_chars(&format!("Last lesson: {}", d.title), budget)),
        }
    }

    /// Style cues from performance band and tone history.
    ///
    /// Low accuracy asks for stepwise, jargon-free delivery; high accuracy
    /// asks for stretch material. Tone tags fill the remaining slots.
    fn style_cues(&self, snapshot: &ProgressSnapshot, tone_tags: &[String]) -> Vec<String> {
        let mut cues: Vec<String> = Vec::new();

        match snapshot.accuracy_pct.map(accuracy_band) {
            Some(0 | 1) => {
                cues.push("stepwise".into());
                cues.push("avoid-jargon".into());
            }
            Some(3) => cues.push("stretch".into()),
            _ => {}
        }
        if snapshot.pace == Pace::Fast && cues.len() < self.settings.style_cue_count {
            cues.push("brisk".into());
        }
        for tag in tone_tags {
            if cues.len() >= self.settings.style_cue_count {
                break;
            }
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !cues.contains(&tag) {
                cues.push(tag);
            }
        }

        cues.truncate(self.settings.style_cue_count);
        cues
    }
}

/// Everything the delivery flow needs from one assembly pass.
pub struct DeliveryContext {
    /// Payload for the generator.
    pub context: StructuredContext,
    /// Local exclusion state.
    pub guardrails: Guardrails,
    /// Persona fingerprint for cache/pending matching.
    pub persona_hash: String,
    /// Recently delivered embeddings for similarity checks.
    pub recent_embeddings: Vec<Vec<f32>>,
}

/// Load assembly inputs from the store and run the assembler.
///
/// Shared by the live orchestrator and the background producer so both
/// generate against the same personalization state.
pub fn gather_context(
    store: &StateStore,
    assembler: &ContextAssembler,
    key: &StateKey,
    record: &PathStateRecord,
    focus_label: &str,
    snapshot: &ProgressSnapshot,
) -> EngineResult<DeliveryContext> {
    let settings = &assembler.settings;

    let curriculum = store.get_curriculum(&key.subject)?;
    let profile = store.get_profile(&key.user)?.unwrap_or_default();
    let preferences = store.get_preferences(&key.user)?;
    let topic_key = TopicKey::new(key.clone(), focus_label.to_owned());
    let deliveries = store.get_deliveries(&topic_key, settings.delivery_retention)?;
    let recent_embeddings = store.recent_embeddings(key, settings.recent_embedding_window)?;

    let previous_subtopic = previous_subtopic_name(record);
    let (course, outline) = curriculum
        .map(|c| (c.course, c.outline))
        .unwrap_or_default();

    let (context, guardrails) = assembler.assemble(&AssembleInputs {
        focus_label,
        course: &course,
        outline: &outline,
        previous_subtopic: previous_subtopic.as_deref(),
        snapshot,
        tone_tags: &profile.tone_tags,
        deliveries: &deliveries,
        preferences: &preferences,
    });

    Ok(DeliveryContext {
        context,
        guardrails,
        persona_hash: persona_for(snapshot, &profile.tone_tags),
        recent_embeddings,
    })
}

/// Name of the subtopic immediately before the cursor, if any.
fn previous_subtopic_name(record: &PathStateRecord) -> Option<String> {
    let cursor = record.cursor;
    if cursor.subtopic_index > 0 {
        return record
            .path
            .subtopic_at(cursor.topic_index, cursor.subtopic_index - 1)
            .map(|s| s.name.clone());
    }
    if cursor.topic_index > 0 {
        let prev_topic = record.path.topics.get(cursor.topic_index - 1)?;
        return prev_topic.subtopics.last().map(|s| s.name.clone());
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mentor_core::ids::LessonId;

    fn delivered(id: &str, title: &str) -> DeliveredLesson {
        DeliveredLesson {
            lesson_id: LessonId::from(id),
            title: title.into(),
            embedding: None,
            delivered_at: Utc::now(),
        }
    }

    fn snapshot(accuracy: Option<u8>, pace: Pace) -> ProgressSnapshot {
        ProgressSnapshot {
            accuracy_pct: accuracy,
            pace,
            ..Default::default()
        }
    }

    fn assemble(
        snapshot: &ProgressSnapshot,
        tone_tags: &[String],
        deliveries: &[DeliveredLesson],
        preferences: &PreferenceSet,
    ) -> (StructuredContext, Guardrails) {
        let assembler = ContextAssembler::new(EngineSettings::default());
        assembler.assemble(&AssembleInputs {
            focus_label: "Topic 1 > Subtopic 1",
            course: "Math Foundations",
            outline: "Linear equations: isolate the variable using inverse operations.",
            previous_subtopic: Some("Order of Operations"),
            snapshot,
            tone_tags,
            deliveries,
            preferences,
        })
    }

    #[test]
    fn low_accuracy_gets_stepwise_cues() {
        let (context, _) = assemble(
            &snapshot(Some(40), Pace::Slow),
            &[],
            &[],
            &PreferenceSet::default(),
        );
        assert!(context.style_cues.contains(&"stepwise".to_string()));
        assert!(context.style_cues.contains(&"avoid-jargon".to_string()));
    }

    #[test]
    fn high_accuracy_gets_stretch() {
        let (context, _) = assemble(
            &snapshot(Some(90), Pace::Slow),
            &[],
            &[],
            &PreferenceSet::default(),
        );
        assert_eq!(context.style_cues, vec!["stretch".to_string()]);
    }

    #[test]
    fn middle_band_gets_no_performance_cue() {
        let (context, _) = assemble(
            &snapshot(Some(75), Pace::Slow),
            &[],
            &[],
            &PreferenceSet::default(),
        );
        assert!(context.style_cues.is_empty());
    }

    #[test]
    fn style_cues_capped_at_three() {
        let tone_tags = vec!["playful".to_string(), "visual".to_string(), "dry".to_string()];
        let (context, _) = assemble(
            &snapshot(Some(40), Pace::Fast),
            &tone_tags,
            &[],
            &PreferenceSet::default(),
        );
        assert_eq!(context.style_cues.len(), 3);
        assert_eq!(context.style_cues[0], "stepwise");
    }

    #[test]
    fn avoid_titles_capped_at_three_most_recent() {
        let deliveries: Vec<DeliveredLesson> = (0..5)
            .map(|i| delivered(&format!("l{i}"), &format!("Lesson {i}")))
            .collect();
        let (context, _) = assemble(
            &snapshot(None, Pace::Slow),
            &[],
            &deliveries,
            &PreferenceSet::default(),
        );
        assert_eq!(context.avoid_titles.len(), 3);
        assert_eq!(context.avoid_titles[0], "Lesson 0");
    }

    #[test]
    fn knowledge_fields_respect_budget() {
        let settings = EngineSettings {
            knowledge_char_budget: 10,
            ..Default::default()
        };
        let assembler = ContextAssembler::new(settings);
        let (context, _) = assembler.assemble(&AssembleInputs {
            focus_label: "T > S",
            course: "A very long course name that exceeds the budget",
            outline: "A very long outline that exceeds the budget by a lot",
            previous_subtopic: None,
            snapshot: &snapshot(None, Pace::Slow),
            tone_tags: &[],
            deliveries: &[],
            preferences: &PreferenceSet::default(),
        });
        assert!(context.knowledge.definition.unwrap().chars().count() <= 10);
        assert!(context.knowledge.application.unwrap().chars().count() <= 10);
    }

    #[test]
    fn guardrails_collect_ids_and_normalized_titles() {
        let deliveries = vec![delivered("l1", "Adding  Like Fractions")];
        let preferences = PreferenceSet {
            disliked: vec![LessonId::from("l9")],
            ..Default::default()
        };
        let (_, guardrails) = assemble(
            &snapshot(None, Pace::Slow),
            &[],
            &deliveries,
            &preferences,
        );
        assert!(guardrails.excludes("l1", ""));
        assert!(guardrails.excludes("l9", ""), "disliked lessons excluded");
        assert!(guardrails.excludes("other", "adding like fractions"));
        assert!(!guardrails.excludes("other", "subtracting fractions"));
    }

    #[test]
    fn guardrails_never_enter_generator_payload() {
        let deliveries = vec![delivered("l1", "Secret Title")];
        let (context, _) = assemble(
            &snapshot(None, Pace::Slow),
            &[],
            &deliveries,
            &PreferenceSet::default(),
        );
        let wire = serde_json::to_value(&context).unwrap();
        assert!(wire.get("excludeIds").is_none());
        // avoid_titles is the only title surface, capped small.
        assert_eq!(wire["avoidTitles"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn gather_context_loads_store_state() {
        use mentor_core::path::{CompletionMap, LearningPath, PathCursor, Subtopic, Topic};
        use std::sync::Arc;

        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let key = StateKey::new("u1", "Algebra 1");
        let path = LearningPath {
            topics: vec![Topic {
                name: "Topic 1".into(),
                subtopics: vec![
                    Subtopic {
                        name: "Subtopic 1".into(),
                        mini_lesson_count: 3,
                        completed: false,
                    },
                    Subtopic {
                        name: "Subtopic 2".into(),
                        mini_lesson_count: 3,
                        completed: false,
                    },
                ],
            }],
        };
        store
            .upsert_path_state(&key, &path, PathCursor::default(), &CompletionMap::new(), None)
            .unwrap();
        store
            .upsert_curriculum(&mentor_store::CurriculumRow {
                subject: "Algebra 1".into(),
                course: "Math Foundations".into(),
                outline: "Linear equations first".into(),
            })
            .unwrap();

        let record = store.get_path_state(&key).unwrap().unwrap();
        let assembler = ContextAssembler::new(EngineSettings::default());
        let gathered = gather_context(
            &store,
            &assembler,
            &key,
            &record,
            "Topic 1 > Subtopic 1",
            &snapshot(Some(60), Pace::Slow),
        )
        .unwrap();

        assert_eq!(gathered.context.focus_label, "Topic 1 > Subtopic 1");
        assert_eq!(
            gathered.context.knowledge.definition.as_deref(),
            Some("Linear equations first")
        );
        assert!(!gathered.persona_hash.is_empty());
        assert!(gathered.recent_embeddings.is_empty());
    }

    #[test]
    fn previous_subtopic_crosses_topic_boundary() {
        use mentor_core::path::{CompletionMap, LearningPath, PathCursor, Subtopic, Topic};

        let path = LearningPath {
            topics: vec![
                Topic {
                    name: "Topic 1".into(),
                    subtopics: vec![Subtopic {
                        name: "Closer".into(),
                        mini_lesson_count: 1,
                        completed: false,
                    }],
                },
                Topic {
                    name: "Topic 2".into(),
                    subtopics: vec![Subtopic {
                        name: "Opener".into(),
                        mini_lesson_count: 1,
                        completed: false,
                    }],
                },
            ],
        };
        let record = mentor_store::PathStateRecord {
            path,
            cursor: PathCursor {
                topic_index: 1,
                subtopic_index: 0,
                delivered_mini_count: 0,
            },
            completion: CompletionMap::new(),
            next_topic: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(previous_subtopic_name(&record).as_deref(), Some("Closer"));
    }

    #[test]
    fn reminder_mentions_most_recent_delivery() {
        let deliveries = vec![delivered("l1", "One-Step Equations")];
        let (context, _) = assemble(
            &snapshot(None, Pace::Slow),
            &[],
            &deliveries,
            &PreferenceSet::default(),
        );
        assert!(
            context
                .knowledge
                .reminder
                .unwrap()
                .contains("One-Step Equations")
        );
    }
}
