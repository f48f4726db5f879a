//! Composite keys for per-learner state.
//!
//! All state is addressed by explicit key structs rather than
//! delimiter-joined strings, so a topic name containing `" > "` (or any
//! other delimiter) can never collide with an unrelated key.

use mentor_core::ids::UserId;

/// Key for all per-(user, subject) state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// The learner.
    pub user: UserId,
    /// The subject, as stored.
    pub subject: String,
}

impl StateKey {
    /// Create a new key.
    #[must_use]
    pub fn new(user: impl Into<UserId>, subject: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            subject: subject.into(),
        }
    }
}

/// Key for per-topic-label state within a subject.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicKey {
    /// The (user, subject) scope.
    pub state: StateKey,
    /// The `"Topic > Subtopic"` focus label.
    pub topic_label: String,
}

impl TopicKey {
    /// Create a new key.
    #[must_use]
    pub fn new(state: StateKey, topic_label: impl Into<String>) -> Self {
        Self {
            state,
            topic_label: topic_label.into(),
        }
    }
}
