//! Branded ID newtypes for type safety.
//!
//! Every entity in the Mentor system has a distinct ID type implemented as a
//! newtype wrapper around `String`. This prevents accidentally passing a
//! lesson ID where an attempt ID is expected.
//!
//! All generated IDs are UUID v7 (time-ordered) via [`uuid::Uuid::now_v7`].
//! User IDs come from the session layer and are never generated here, but
//! share the same newtype shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a generated lesson.
    LessonId
}

branded_id! {
    /// Unique identifier for a practice attempt.
    AttemptId
}

branded_id! {
    /// Unique identifier for a learner.
    UserId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_id_new_is_uuid_v7() {
        let id = LessonId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn attempt_id_new_is_uuid_v7() {
        let id = AttemptId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        let a = LessonId::new();
        let b = LessonId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn from_string() {
        let id = LessonId::from_string("custom-id".to_owned());
        assert_eq!(id.as_str(), "custom-id");
    }

    #[test]
    fn from_str_ref() {
        let id = UserId::from("learner-1");
        assert_eq!(id.as_str(), "learner-1");
    }

    #[test]
    fn deref_to_str() {
        let id = LessonId::from("hello");
        let s: &str = &id;
        assert_eq!(s, "hello");
    }

    #[test]
    fn display() {
        let id = LessonId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
    }

    #[test]
    fn serde_roundtrip() {
        let id = LessonId::from("serde-test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"serde-test\"");
        let back: LessonId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_in_struct() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Delivery {
            lesson_id: LessonId,
            user_id: UserId,
        }

        let d = Delivery {
            lesson_id: LessonId::from("les-1"),
            user_id: UserId::from("u-1"),
        };
        let json = serde_json::to_string(&d).unwrap();
        let back: Delivery = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn hash_and_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = LessonId::from("same");
        let _ = set.insert(id.clone());
        let _ = set.insert(id.clone());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn into_inner() {
        let id = UserId::from("inner-test");
        assert_eq!(id.into_inner(), "inner-test");
    }
}
