use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! uuid_id {
    ($(#[$docs:meta])* $name:ident) => {
        $(#[$docs])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            #[must_use]
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map($name::new).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a course.
    CourseId
}

uuid_id! {
    /// Unique identifier for a course module.
    ModuleId
}

uuid_id! {
    /// Unique identifier for a lesson.
    LessonId
}

uuid_id! {
    /// Unique identifier for a learner (soft reference to the identity service).
    LearnerId
}

uuid_id! {
    /// Unique identifier for an enrollment.
    EnrollmentId
}

uuid_id! {
    /// Unique identifier for a quiz.
    QuizId
}

uuid_id! {
    /// Unique identifier for a SCORM runtime session.
    SessionId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_roundtrip() {
        let id = LessonId::generate();
        let parsed: LessonId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn id_from_str_invalid() {
        let result = "not-a-uuid".parse::<EnrollmentId>();
        assert!(result.is_err());
    }

    #[test]
    fn id_debug_includes_type_name() {
        let id = CourseId::generate();
        assert!(format!("{id:?}").starts_with("CourseId("));
    }
}
