//! Shared completion recalculation used by every progress-writing service.
//!
//! After any signal mutates a lesson's progress, the owning service calls
//! [`recalculate`] so the enrollment's weighted percentage and completion
//! status stay derived from the same stored rows every code path writes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use progress_core::aggregate;
use progress_core::model::{
    CourseId, CourseStructure, Enrollment, EnrollmentId, Lesson, LessonId, LessonProgress,
};
use progress_core::policy::CompletionPolicy;
use progress_storage::repository::Storage;

use crate::error::{ProgressError, map_not_found};

/// Catalog snapshot plus the parsed completion policy for one course.
pub(crate) struct CourseContext {
    pub structure: CourseStructure,
    pub policy: CompletionPolicy,
}

pub(crate) async fn load_course_context(
    storage: &Storage,
    course_id: CourseId,
) -> Result<CourseContext, ProgressError> {
    let course = storage
        .catalog
        .get_course(course_id)
        .await
        .map_err(|e| map_not_found(e, ProgressError::CourseNotFound))?;
    let policy = CompletionPolicy::from_json(&course.completion_logic)?;
    let structure = storage.catalog.course_structure(course_id).await?;
    Ok(CourseContext { structure, policy })
}

/// Fetch an enrollment that may receive progress signals.
///
/// Missing, dropped, and not-yet-approved enrollments all surface as
/// `NotEnrolled`; callers never learn which.
pub(crate) async fn active_enrollment(
    storage: &Storage,
    enrollment_id: EnrollmentId,
) -> Result<Enrollment, ProgressError> {
    let enrollment = storage
        .enrollments
        .get_enrollment(enrollment_id)
        .await
        .map_err(|e| map_not_found(e, ProgressError::NotEnrolled))?;
    if !enrollment.is_active() {
        return Err(ProgressError::NotEnrolled);
    }
    Ok(enrollment)
}

/// Fetch a lesson and confirm it belongs to the enrollment's course.
pub(crate) async fn lesson_in_course(
    storage: &Storage,
    lesson_id: LessonId,
    course_id: CourseId,
) -> Result<Lesson, ProgressError> {
    let lesson = storage
        .catalog
        .get_lesson(lesson_id)
        .await
        .map_err(|e| map_not_found(e, ProgressError::LessonNotFound))?;
    if lesson.course_id != course_id {
        return Err(ProgressError::LessonNotFound);
    }
    Ok(lesson)
}

/// Load the progress row for a lesson, creating a fresh one on first signal.
pub(crate) async fn progress_row(
    storage: &Storage,
    enrollment_id: EnrollmentId,
    lesson_id: LessonId,
) -> Result<LessonProgress, ProgressError> {
    Ok(storage
        .progress
        .get_progress(enrollment_id, lesson_id)
        .await?
        .unwrap_or_else(|| LessonProgress::new(enrollment_id, lesson_id)))
}

pub(crate) fn progress_map(rows: Vec<LessonProgress>) -> HashMap<LessonId, LessonProgress> {
    rows.into_iter().map(|p| (p.lesson_id(), p)).collect()
}

/// Recompute the enrollment's weighted progress from stored rows and persist
/// the result, completing the enrollment once the policy threshold is met.
///
/// Returns the recomputed percentage.
pub(crate) async fn recalculate(
    storage: &Storage,
    enrollment: &mut Enrollment,
    ctx: &CourseContext,
    now: DateTime<Utc>,
) -> Result<f64, ProgressError> {
    let rows = storage
        .progress
        .progress_for_enrollment(enrollment.enrollment_id())
        .await?;
    let map = progress_map(rows);
    let pct = aggregate::course_progress(&ctx.structure, &map, &ctx.policy);
    enrollment.set_progress_pct(pct);

    if !ctx.structure.is_empty() && pct >= ctx.policy.pct_required {
        enrollment.mark_completed(now);
    }

    storage.enrollments.upsert_enrollment(enrollment).await?;
    Ok(pct)
}
