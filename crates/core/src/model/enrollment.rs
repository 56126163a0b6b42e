use chrono::{DateTime, Utc};
use thiserror::Error;

use super::enums::EnrollmentStatus;
use super::ids::{CourseId, EnrollmentId, LearnerId, LessonId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("cannot transition enrollment from {from} to {to}")]
    InvalidTransition {
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },
}

/// The relationship record tracking one learner's progress through one course.
///
/// At most one enrollment exists per (learner, course); the storage layer
/// enforces the uniqueness. Status moves forward only, except `Dropped`,
/// which is terminal from any non-completed state. Enrollments are never
/// hard-deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    enrollment_id: EnrollmentId,
    learner_id: LearnerId,
    course_id: CourseId,
    progress_pct: f64,
    status: EnrollmentStatus,
    completed_at: Option<DateTime<Utc>>,
    last_lesson_id: Option<LessonId>,
    last_position_secs: Option<u32>,
    created_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a fresh enrollment.
    ///
    /// Starts in `PendingApproval` when the course requires instructor
    /// approval, otherwise `InProgress`.
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        course_id: CourseId,
        approval_required: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if approval_required {
            EnrollmentStatus::PendingApproval
        } else {
            EnrollmentStatus::InProgress
        };
        Self {
            enrollment_id: EnrollmentId::generate(),
            learner_id,
            course_id,
            progress_pct: 0.0,
            status,
            completed_at: None,
            last_lesson_id: None,
            last_position_secs: None,
            created_at: now,
        }
    }

    /// Rehydrate an enrollment from persisted storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        enrollment_id: EnrollmentId,
        learner_id: LearnerId,
        course_id: CourseId,
        progress_pct: f64,
        status: EnrollmentStatus,
        completed_at: Option<DateTime<Utc>>,
        last_lesson_id: Option<LessonId>,
        last_position_secs: Option<u32>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            enrollment_id,
            learner_id,
            course_id,
            progress_pct,
            status,
            completed_at,
            last_lesson_id,
            last_position_secs,
            created_at,
        }
    }

    #[must_use]
    pub fn enrollment_id(&self) -> EnrollmentId {
        self.enrollment_id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn progress_pct(&self) -> f64 {
        self.progress_pct
    }

    #[must_use]
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn last_lesson_id(&self) -> Option<LessonId> {
        self.last_lesson_id
    }

    #[must_use]
    pub fn last_position_secs(&self) -> Option<u32> {
        self.last_position_secs
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether progress signals are accepted for this enrollment.
    ///
    /// Dropped and not-yet-approved enrollments fail the guard.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            EnrollmentStatus::InProgress | EnrollmentStatus::Completed
        )
    }

    /// Overwrite the weighted progress percentage (already rounded by the
    /// aggregator).
    pub fn set_progress_pct(&mut self, pct: f64) {
        self.progress_pct = pct;
    }

    /// Transition to `Completed` and stamp the completion time.
    ///
    /// Idempotent: returns `false` without touching the timestamp when the
    /// enrollment is already completed or dropped.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            EnrollmentStatus::Completed | EnrollmentStatus::Dropped => false,
            EnrollmentStatus::PendingApproval | EnrollmentStatus::InProgress => {
                self.status = EnrollmentStatus::Completed;
                self.completed_at = Some(now);
                true
            }
        }
    }

    /// Approve a pending enrollment.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidTransition` unless the enrollment is
    /// `PendingApproval`.
    pub fn approve(&mut self) -> Result<(), EnrollmentError> {
        if self.status != EnrollmentStatus::PendingApproval {
            return Err(EnrollmentError::InvalidTransition {
                from: self.status,
                to: EnrollmentStatus::InProgress,
            });
        }
        self.status = EnrollmentStatus::InProgress;
        Ok(())
    }

    /// Drop the enrollment (also used to reject a pending one).
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidTransition` when already completed;
    /// completion is final.
    pub fn drop_out(&mut self) -> Result<(), EnrollmentError> {
        if self.status == EnrollmentStatus::Completed {
            return Err(EnrollmentError::InvalidTransition {
                from: self.status,
                to: EnrollmentStatus::Dropped,
            });
        }
        self.status = EnrollmentStatus::Dropped;
        Ok(())
    }

    /// Record the resume pointer (last lesson + position).
    pub fn update_resume(&mut self, lesson_id: LessonId, position_secs: u32) {
        self.last_lesson_id = Some(lesson_id);
        self.last_position_secs = Some(position_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn enrollment() -> Enrollment {
        Enrollment::new(LearnerId::generate(), CourseId::generate(), false, fixed_now())
    }

    #[test]
    fn new_enrollment_is_in_progress_with_zero_pct() {
        let e = enrollment();
        assert_eq!(e.status(), EnrollmentStatus::InProgress);
        assert_eq!(e.progress_pct(), 0.0);
        assert!(e.is_active());
    }

    #[test]
    fn approval_required_starts_pending_and_inactive() {
        let mut e = Enrollment::new(LearnerId::generate(), CourseId::generate(), true, fixed_now());
        assert_eq!(e.status(), EnrollmentStatus::PendingApproval);
        assert!(!e.is_active());
        e.approve().unwrap();
        assert!(e.is_active());
        assert!(e.approve().is_err());
    }

    #[test]
    fn mark_completed_is_idempotent() {
        let mut e = enrollment();
        let now = fixed_now();
        assert!(e.mark_completed(now));
        let stamped = e.completed_at();
        assert!(!e.mark_completed(now + chrono::Duration::hours(1)));
        assert_eq!(e.completed_at(), stamped);
    }

    #[test]
    fn completed_enrollment_cannot_be_dropped() {
        let mut e = enrollment();
        e.mark_completed(fixed_now());
        assert!(e.drop_out().is_err());
    }

    #[test]
    fn dropped_enrollment_rejects_completion() {
        let mut e = enrollment();
        e.drop_out().unwrap();
        assert!(!e.mark_completed(fixed_now()));
        assert_eq!(e.status(), EnrollmentStatus::Dropped);
    }
}
