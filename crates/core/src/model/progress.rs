use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::enums::LessonProgressStatus;
use super::ids::{EnrollmentId, LessonId};
use crate::intervals::Interval;

/// Per-lesson progress state for one enrollment.
///
/// One row per (enrollment, lesson), created lazily on the first signal for
/// that lesson. Status is monotonic: once `Completed`, later heartbeats never
/// regress it, which keeps repeated or out-of-order client retries safe.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonProgress {
    enrollment_id: EnrollmentId,
    lesson_id: LessonId,
    status: LessonProgressStatus,
    watch_duration_secs: u32,
    watched_intervals: Vec<Interval>,
    watched_pct: f64,
    pages_viewed: BTreeSet<u32>,
    pages_pct: f64,
    quiz_score: Option<u32>,
    quiz_attempts: u32,
    scorm_score: Option<i32>,
    completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Fresh progress row for the first signal on a lesson.
    #[must_use]
    pub fn new(enrollment_id: EnrollmentId, lesson_id: LessonId) -> Self {
        Self {
            enrollment_id,
            lesson_id,
            status: LessonProgressStatus::NotStarted,
            watch_duration_secs: 0,
            watched_intervals: Vec::new(),
            watched_pct: 0.0,
            pages_viewed: BTreeSet::new(),
            pages_pct: 0.0,
            quiz_score: None,
            quiz_attempts: 0,
            scorm_score: None,
            completed_at: None,
        }
    }

    /// Rehydrate a progress row from persisted storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
        status: LessonProgressStatus,
        watch_duration_secs: u32,
        watched_intervals: Vec<Interval>,
        watched_pct: f64,
        pages_viewed: BTreeSet<u32>,
        pages_pct: f64,
        quiz_score: Option<u32>,
        quiz_attempts: u32,
        scorm_score: Option<i32>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            enrollment_id,
            lesson_id,
            status,
            watch_duration_secs,
            watched_intervals,
            watched_pct,
            pages_viewed,
            pages_pct,
            quiz_score,
            quiz_attempts,
            scorm_score,
            completed_at,
        }
    }

    #[must_use]
    pub fn enrollment_id(&self) -> EnrollmentId {
        self.enrollment_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn status(&self) -> LessonProgressStatus {
        self.status
    }

    #[must_use]
    pub fn watch_duration_secs(&self) -> u32 {
        self.watch_duration_secs
    }

    /// Canonical merged watched-interval set.
    #[must_use]
    pub fn watched_intervals(&self) -> &[Interval] {
        &self.watched_intervals
    }

    #[must_use]
    pub fn watched_pct(&self) -> f64 {
        self.watched_pct
    }

    /// Unique pages the learner has viewed.
    #[must_use]
    pub fn pages_viewed(&self) -> &BTreeSet<u32> {
        &self.pages_viewed
    }

    #[must_use]
    pub fn pages_pct(&self) -> f64 {
        self.pages_pct
    }

    /// Best quiz score recorded across attempts.
    #[must_use]
    pub fn quiz_score(&self) -> Option<u32> {
        self.quiz_score
    }

    #[must_use]
    pub fn quiz_attempts(&self) -> u32 {
        self.quiz_attempts
    }

    #[must_use]
    pub fn scorm_score(&self) -> Option<i32> {
        self.scorm_score
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == LessonProgressStatus::Completed
    }

    /// Store the merged watched-interval state for a video lesson.
    pub fn record_watched(&mut self, merged: Vec<Interval>, total_secs: u32, watched_pct: f64) {
        self.watched_intervals = merged;
        self.watch_duration_secs = total_secs;
        self.watched_pct = watched_pct;
        self.begin();
    }

    /// Store viewed pages for a document lesson.
    pub fn record_pages(&mut self, viewed: BTreeSet<u32>, pages_pct: f64) {
        self.pages_viewed = viewed;
        self.pages_pct = pages_pct;
        self.begin();
    }

    /// Record a graded quiz attempt. Keeps the best score across attempts.
    pub fn record_quiz_attempt(&mut self, score: u32, attempt_number: u32) {
        self.quiz_score = Some(self.quiz_score.map_or(score, |best| best.max(score)));
        self.quiz_attempts = self.quiz_attempts.max(attempt_number);
        self.begin();
    }

    /// Copy the raw score from a completed SCORM session.
    pub fn record_scorm_score(&mut self, score_raw: Option<i32>) {
        self.scorm_score = score_raw;
        self.begin();
    }

    /// Move to `Completed` and stamp the time; no-op when already completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        if self.status != LessonProgressStatus::Completed {
            self.status = LessonProgressStatus::Completed;
            self.completed_at = Some(now);
        }
    }

    /// Bump `NotStarted` to `InProgress`; never regresses `Completed`.
    fn begin(&mut self) {
        if self.status == LessonProgressStatus::NotStarted {
            self.status = LessonProgressStatus::InProgress;
        }
    }
}
