//! Completion policy (`completion_logic`) attached to a course.
//!
//! Supplied by the catalog service as JSON; deserialized once into a typed
//! struct and validated at load time rather than looked up ad hoc per lesson.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::LessonType;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("malformed completion_logic: {0}")]
    Malformed(String),

    #[error("{field} must be within 0-100, got {value}")]
    ThresholdOutOfRange { field: &'static str, value: f64 },

    #[error("weight for {lesson_type} must be non-negative and finite, got {value}")]
    InvalidWeight { lesson_type: &'static str, value: f64 },
}

/// Per-lesson-type weight overrides; every weight defaults to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeWeights {
    #[serde(rename = "VIDEO")]
    pub video: f64,
    #[serde(rename = "PDF")]
    pub pdf: f64,
    #[serde(rename = "TEXT")]
    pub text: f64,
    #[serde(rename = "QUIZ")]
    pub quiz: f64,
    #[serde(rename = "SCORM")]
    pub scorm: f64,
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self {
            video: 1.0,
            pdf: 1.0,
            text: 1.0,
            quiz: 1.0,
            scorm: 1.0,
        }
    }
}

impl TypeWeights {
    #[must_use]
    pub fn for_type(&self, lesson_type: LessonType) -> f64 {
        match lesson_type {
            LessonType::Video => self.video,
            LessonType::Pdf => self.pdf,
            LessonType::Text => self.text,
            LessonType::Quiz => self.quiz,
            LessonType::Scorm => self.scorm,
        }
    }
}

/// Configurable completion rules for one course.
///
/// Defaults mirror the platform baseline: 90% watch/read thresholds, a 70
/// passing score, and 100% weighted progress required for completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionPolicy {
    /// Watched percentage at which a video lesson counts as complete.
    pub video_watch_pct: f64,
    /// Viewed-pages percentage at which a document lesson counts as complete.
    pub doc_read_pct: f64,
    /// Best quiz score at which a quiz lesson earns course credit.
    pub score_threshold: u32,
    /// Overall weighted percentage required to complete the enrollment.
    pub pct_required: f64,
    pub weights: TypeWeights,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            video_watch_pct: 90.0,
            doc_read_pct: 90.0,
            score_threshold: 70,
            pct_required: 100.0,
            weights: TypeWeights::default(),
        }
    }
}

impl CompletionPolicy {
    /// Parse a `completion_logic` JSON document, falling back to defaults for
    /// missing or null fields, and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::Malformed` when the document does not
    /// deserialize (a shape error must never silently grade the course under
    /// defaults), and `ThresholdOutOfRange`/`InvalidWeight` for values that
    /// parse but violate their constraints.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PolicyError> {
        let policy: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value.clone())
                .map_err(|e| PolicyError::Malformed(e.to_string()))?
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check all thresholds and weights.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, value) in [
            ("video_watch_pct", self.video_watch_pct),
            ("doc_read_pct", self.doc_read_pct),
            ("pct_required", self.pct_required),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(PolicyError::ThresholdOutOfRange { field, value });
            }
        }
        if self.score_threshold > 100 {
            return Err(PolicyError::ThresholdOutOfRange {
                field: "score_threshold",
                value: f64::from(self.score_threshold),
            });
        }
        for (lesson_type, value) in [
            ("VIDEO", self.weights.video),
            ("PDF", self.weights.pdf),
            ("TEXT", self.weights.text),
            ("QUIZ", self.weights.quiz),
            ("SCORM", self.weights.scorm),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PolicyError::InvalidWeight { lesson_type, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_policy_matches_platform_baseline() {
        let policy = CompletionPolicy::default();
        assert_eq!(policy.video_watch_pct, 90.0);
        assert_eq!(policy.doc_read_pct, 90.0);
        assert_eq!(policy.score_threshold, 70);
        assert_eq!(policy.pct_required, 100.0);
        assert_eq!(policy.weights.quiz, 1.0);
    }

    #[test]
    fn from_json_applies_overrides_and_defaults() {
        let value = json!({
            "video_watch_pct": 80,
            "weights": {"QUIZ": 1.5, "TEXT": 0.5}
        });
        let policy = CompletionPolicy::from_json(&value).unwrap();
        assert_eq!(policy.video_watch_pct, 80.0);
        assert_eq!(policy.doc_read_pct, 90.0);
        assert_eq!(policy.weights.quiz, 1.5);
        assert_eq!(policy.weights.text, 0.5);
        assert_eq!(policy.weights.video, 1.0);
    }

    #[test]
    fn malformed_document_is_rejected_not_defaulted() {
        let value = json!({ "video_watch_pct": "90" });
        assert!(matches!(
            CompletionPolicy::from_json(&value),
            Err(PolicyError::Malformed(_))
        ));

        assert_eq!(
            CompletionPolicy::from_json(&serde_json::Value::Null).unwrap(),
            CompletionPolicy::default()
        );
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut policy = CompletionPolicy::default();
        policy.pct_required = 120.0;
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::ThresholdOutOfRange {
                field: "pct_required",
                ..
            })
        ));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut policy = CompletionPolicy::default();
        policy.weights.scorm = -1.0;
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::InvalidWeight {
                lesson_type: "SCORM",
                ..
            })
        ));
    }
}
