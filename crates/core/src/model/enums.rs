use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored enum value does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

macro_rules! str_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stable string form used in storage and wire payloads.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant::new(stringify!($name), other)),
                }
            }
        }
    };
}

/// Content type of a lesson, driving which progress processor handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LessonType {
    #[serde(rename = "VIDEO")]
    Video,
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "QUIZ")]
    Quiz,
    #[serde(rename = "SCORM")]
    Scorm,
}

str_enum!(LessonType {
    Video => "VIDEO",
    Pdf => "PDF",
    Text => "TEXT",
    Quiz => "QUIZ",
    Scorm => "SCORM",
});

/// Lifecycle of an enrollment.
///
/// Transitions are monotonic except `Dropped`, which is terminal from any
/// non-completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    #[serde(rename = "PENDING_APPROVAL")]
    PendingApproval,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "DROPPED")]
    Dropped,
}

str_enum!(EnrollmentStatus {
    PendingApproval => "PENDING_APPROVAL",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Dropped => "DROPPED",
});

/// Per-lesson progress status; moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LessonProgressStatus {
    #[serde(rename = "NOT_STARTED")]
    NotStarted,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
}

str_enum!(LessonProgressStatus {
    NotStarted => "NOT_STARTED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
});

/// Supported quiz question types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "MSQ")]
    Msq,
    #[serde(rename = "TRUE_FALSE")]
    TrueFalse,
    #[serde(rename = "SHORT_ANSWER")]
    ShortAnswer,
}

str_enum!(QuestionType {
    Mcq => "MCQ",
    Msq => "MSQ",
    TrueFalse => "TRUE_FALSE",
    ShortAnswer => "SHORT_ANSWER",
});

/// When, if ever, correct answers are revealed after a quiz submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShowAnswersPolicy {
    #[default]
    #[serde(rename = "NEVER")]
    Never,
    #[serde(rename = "AFTER_SUBMIT")]
    AfterSubmit,
    #[serde(rename = "AFTER_PASS")]
    AfterPass,
}

str_enum!(ShowAnswersPolicy {
    Never => "NEVER",
    AfterSubmit => "AFTER_SUBMIT",
    AfterPass => "AFTER_PASS",
});

/// SCORM runtime session state machine:
/// `Initialized → InProgress → {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScormSessionStatus {
    #[serde(rename = "INITIALIZED")]
    Initialized,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

str_enum!(ScormSessionStatus {
    Initialized => "INITIALIZED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

impl ScormSessionStatus {
    /// An open session may still receive runtime commits.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Initialized | Self::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_type_roundtrip() {
        for lt in [
            LessonType::Video,
            LessonType::Pdf,
            LessonType::Text,
            LessonType::Quiz,
            LessonType::Scorm,
        ] {
            assert_eq!(lt.as_str().parse::<LessonType>().unwrap(), lt);
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = "AUDIO".parse::<LessonType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown LessonType value: AUDIO");
    }

    #[test]
    fn scorm_open_states() {
        assert!(ScormSessionStatus::Initialized.is_open());
        assert!(ScormSessionStatus::InProgress.is_open());
        assert!(!ScormSessionStatus::Completed.is_open());
        assert!(!ScormSessionStatus::Failed.is_open());
    }
}
