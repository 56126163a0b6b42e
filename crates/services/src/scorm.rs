use progress_core::model::{
    EnrollmentId, LessonId, LessonType, ScormCommit, ScormSession, ScormSessionError,
    ScormSessionStatus, SessionId,
};
use progress_storage::repository::Storage;

use crate::Clock;
use crate::completion::{self, active_enrollment, lesson_in_course, progress_row};
use crate::error::{ProgressError, map_not_found};

/// Tracks SCORM runtime sessions and folds their outcomes into progress.
#[derive(Clone)]
pub struct ScormService {
    clock: Clock,
    storage: Storage,
}

/// Result of applying one runtime commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommitOutcome {
    pub status: ScormSessionStatus,
    pub lesson_completed: bool,
    pub course_progress_pct: f64,
}

impl ScormService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage) -> Self {
        Self { clock, storage }
    }

    /// Open a runtime session for a SCORM lesson, reusing an existing open
    /// session so a page reload resumes instead of forking.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled`, `LessonNotFound`, `WrongLessonType` for
    /// non-SCORM lessons, or `Storage`.
    pub async fn open_session(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<ScormSession, ProgressError> {
        let enrollment = active_enrollment(&self.storage, enrollment_id).await?;
        let lesson = lesson_in_course(&self.storage, lesson_id, enrollment.course_id()).await?;
        if lesson.lesson_type != LessonType::Scorm {
            return Err(ProgressError::WrongLessonType {
                expected: LessonType::Scorm,
                actual: lesson.lesson_type,
            });
        }

        if let Some(open) = self
            .storage
            .scorm_sessions
            .find_open_session(enrollment_id, lesson_id)
            .await?
        {
            return Ok(open);
        }

        let session = ScormSession::open(enrollment_id, lesson_id, self.clock.now());
        self.storage.scorm_sessions.upsert_session(&session).await?;
        Ok(session)
    }

    /// Apply one commit of runtime data to a session.
    ///
    /// Tracking keys merge into the session; a `"completed"` completion
    /// status finalizes it and marks the lesson complete, and a `"failed"`
    /// success status closes the session without completing the lesson.
    /// Commits against an already-completed session are rejected.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound`, `SessionAlreadyCompleted`, `NotEnrolled`
    /// when the owning enrollment is gone or inactive, or `Storage`.
    pub async fn commit(
        &self,
        session_id: SessionId,
        commit: ScormCommit,
    ) -> Result<CommitOutcome, ProgressError> {
        let now = self.clock.now();
        let mut session = self
            .storage
            .scorm_sessions
            .get_session(session_id)
            .await
            .map_err(|e| map_not_found(e, ProgressError::SessionNotFound))?;
        let mut enrollment = active_enrollment(&self.storage, session.enrollment_id()).await?;

        session.apply_commit(commit, now).map_err(|e| match e {
            ScormSessionError::AlreadyCompleted => ProgressError::SessionAlreadyCompleted,
        })?;
        self.storage.scorm_sessions.upsert_session(&session).await?;

        let mut progress =
            progress_row(&self.storage, session.enrollment_id(), session.lesson_id()).await?;
        progress.record_scorm_score(session.score_raw());
        if session.status() == ScormSessionStatus::Completed {
            progress.mark_completed(now);
        }
        let lesson_completed = progress.is_completed();
        self.storage.progress.upsert_progress(&progress).await?;

        let ctx = completion::load_course_context(&self.storage, enrollment.course_id()).await?;
        let course_progress_pct =
            completion::recalculate(&self.storage, &mut enrollment, &ctx, now).await?;

        Ok(CommitOutcome {
            status: session.status(),
            lesson_completed,
            course_progress_pct,
        })
    }
}
