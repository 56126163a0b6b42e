use chrono::{DateTime, Utc};

use progress_core::aggregate;
use progress_core::model::{
    CourseId, Enrollment, EnrollmentId, EnrollmentStatus, LearnerId, Lesson, LessonId,
    LessonProgressStatus, LessonType, ModuleId,
};
use progress_storage::repository::Storage;

use crate::Clock;
use crate::completion::{self, progress_map};
use crate::error::{ProgressError, map_not_found};

/// Manages the enrollment lifecycle and the detailed progress report.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    storage: Storage,
}

/// Per-lesson line in the detailed report.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonReport {
    pub lesson_id: LessonId,
    pub title: String,
    pub lesson_type: LessonType,
    pub status: LessonProgressStatus,
    pub watched_pct: f64,
    pub pages_pct: f64,
    pub quiz_score: Option<u32>,
    pub scorm_score: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-module rollup in the detailed report.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleReport {
    pub module_id: ModuleId,
    pub title: String,
    pub progress_pct: f64,
    pub lessons: Vec<LessonReport>,
}

/// Full progress picture for one enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseProgressReport {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub progress_pct: f64,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_lesson_id: Option<LessonId>,
    pub last_position_secs: Option<u32>,
    pub modules: Vec<ModuleReport>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage) -> Self {
        Self { clock, storage }
    }

    /// Enroll a learner in a course.
    ///
    /// Courses flagged as approval-gated start the enrollment in
    /// `PendingApproval`; everything else starts `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, `AlreadyEnrolled` when any enrollment for
    /// the pair exists (including dropped ones), or `Storage`.
    pub async fn enroll(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Enrollment, ProgressError> {
        let course = self
            .storage
            .catalog
            .get_course(course_id)
            .await
            .map_err(|e| map_not_found(e, ProgressError::CourseNotFound))?;

        if self
            .storage
            .enrollments
            .find_enrollment(learner_id, course_id)
            .await?
            .is_some()
        {
            return Err(ProgressError::AlreadyEnrolled);
        }

        let enrollment = Enrollment::new(
            learner_id,
            course_id,
            course.requires_approval,
            self.clock.now(),
        );
        self.storage.enrollments.upsert_enrollment(&enrollment).await?;
        Ok(enrollment)
    }

    /// Approve a pending enrollment so progress signals are accepted.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled` for an unknown enrollment, `Enrollment` when it
    /// is not pending, or `Storage`.
    pub async fn approve(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, ProgressError> {
        let mut enrollment = self.get(enrollment_id).await?;
        enrollment.approve()?;
        self.storage.enrollments.upsert_enrollment(&enrollment).await?;
        Ok(enrollment)
    }

    /// Reject a pending enrollment. The record is kept as `Dropped`.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled`, `Enrollment` for completed enrollments, or
    /// `Storage`.
    pub async fn reject(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, ProgressError> {
        self.drop_out(enrollment_id).await
    }

    /// Drop an enrollment. Completion is final and cannot be dropped.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled`, `Enrollment` for completed enrollments, or
    /// `Storage`.
    pub async fn drop_out(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, ProgressError> {
        let mut enrollment = self.get(enrollment_id).await?;
        enrollment.drop_out()?;
        self.storage.enrollments.upsert_enrollment(&enrollment).await?;
        Ok(enrollment)
    }

    /// Check whether a learner may open a lesson's content.
    ///
    /// Preview lessons are open to everyone; everything else needs an active
    /// enrollment in the lesson's course.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound`, `ContentNotAccessible`, or `Storage`.
    pub async fn lesson_access(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Lesson, ProgressError> {
        let lesson = self
            .storage
            .catalog
            .get_lesson(lesson_id)
            .await
            .map_err(|e| map_not_found(e, ProgressError::LessonNotFound))?;
        if lesson.is_preview {
            return Ok(lesson);
        }

        let enrolled = self
            .storage
            .enrollments
            .find_enrollment(learner_id, lesson.course_id)
            .await?
            .is_some_and(|e| e.is_active());
        if enrolled {
            Ok(lesson)
        } else {
            Err(ProgressError::ContentNotAccessible)
        }
    }

    /// Build the detailed per-module, per-lesson progress report.
    ///
    /// Readable for any existing enrollment, including dropped ones.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled` for an unknown enrollment, or `Storage`.
    pub async fn detailed_course_progress(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<CourseProgressReport, ProgressError> {
        let enrollment = self.get(enrollment_id).await?;
        let ctx = completion::load_course_context(&self.storage, enrollment.course_id()).await?;
        let rows = self
            .storage
            .progress
            .progress_for_enrollment(enrollment_id)
            .await?;
        let map = progress_map(rows);

        let modules = ctx
            .structure
            .modules()
            .iter()
            .map(|module| ModuleReport {
                module_id: module.module_id,
                title: module.title.clone(),
                progress_pct: aggregate::module_completion(&ctx.structure, module.module_id, &map),
                lessons: ctx
                    .structure
                    .lessons_in_module(module.module_id)
                    .map(|lesson| {
                        let progress = map.get(&lesson.lesson_id);
                        LessonReport {
                            lesson_id: lesson.lesson_id,
                            title: lesson.title.clone(),
                            lesson_type: lesson.lesson_type,
                            status: progress
                                .map_or(LessonProgressStatus::NotStarted, |p| p.status()),
                            watched_pct: progress.map_or(0.0, |p| p.watched_pct()),
                            pages_pct: progress.map_or(0.0, |p| p.pages_pct()),
                            quiz_score: progress.and_then(|p| p.quiz_score()),
                            scorm_score: progress.and_then(|p| p.scorm_score()),
                            completed_at: progress.and_then(|p| p.completed_at()),
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(CourseProgressReport {
            enrollment_id,
            course_id: enrollment.course_id(),
            status: enrollment.status(),
            progress_pct: enrollment.progress_pct(),
            completed_at: enrollment.completed_at(),
            last_lesson_id: enrollment.last_lesson_id(),
            last_position_secs: enrollment.last_position_secs(),
            modules,
        })
    }

    async fn get(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, ProgressError> {
        self.storage
            .enrollments
            .get_enrollment(enrollment_id)
            .await
            .map_err(|e| map_not_found(e, ProgressError::NotEnrolled))
    }
}
