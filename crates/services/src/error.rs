//! Shared error taxonomy for the services crate.

use thiserror::Error;

use progress_core::model::{EnrollmentError, LessonType};
use progress_core::policy::PolicyError;
use progress_storage::repository::StorageError;

/// Errors emitted by the progress services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("learner has no active enrollment for this course")]
    NotEnrolled,

    #[error("course not found")]
    CourseNotFound,

    #[error("lesson not found in this course")]
    LessonNotFound,

    #[error("quiz not found")]
    QuizNotFound,

    #[error("SCORM session not found")]
    SessionNotFound,

    #[error("learner is already enrolled in this course")]
    AlreadyEnrolled,

    #[error("maximum of {limit} attempts reached for this quiz")]
    MaxAttemptsReached { limit: u32 },

    #[error("quiz time limit of {limit_secs}s exceeded")]
    QuizTimeLimitExceeded { limit_secs: u32 },

    #[error("SCORM session is already completed")]
    SessionAlreadyCompleted,

    #[error("content is not accessible without an active enrollment")]
    ContentNotAccessible,

    #[error("operation expects a {expected} lesson, got {actual}")]
    WrongLessonType {
        expected: LessonType,
        actual: LessonType,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Map a repository `NotFound` to a domain-specific error, passing every
/// other storage failure through.
pub(crate) fn map_not_found(e: StorageError, not_found: ProgressError) -> ProgressError {
    match e {
        StorageError::NotFound => not_found,
        other => ProgressError::Storage(other),
    }
}
