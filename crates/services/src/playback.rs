use std::collections::BTreeSet;
use std::sync::Arc;

use progress_core::aggregate;
use progress_core::intervals::{self, Interval};
use progress_core::model::{EnrollmentId, LessonId, LessonType};
use progress_storage::cache::{ResumeCache, ResumeSnapshot};
use progress_storage::repository::Storage;

use crate::Clock;
use crate::completion::{self, active_enrollment, progress_row};
use crate::error::ProgressError;

/// Handles video and document heartbeats from the player, plus resume reads.
#[derive(Clone)]
pub struct PlaybackService {
    clock: Clock,
    storage: Storage,
    cache: Arc<dyn ResumeCache>,
}

/// Result of applying one video heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoHeartbeat {
    pub watched_pct: f64,
    pub watch_duration_secs: u32,
    pub lesson_completed: bool,
    pub course_progress_pct: f64,
}

/// Result of applying one document heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentHeartbeat {
    pub pages_pct: f64,
    pub lesson_completed: bool,
    pub course_progress_pct: f64,
}

/// Where the learner left off in a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePosition {
    pub lesson_id: LessonId,
    pub position_secs: u32,
}

impl PlaybackService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage, cache: Arc<dyn ResumeCache>) -> Self {
        Self {
            clock,
            storage,
            cache,
        }
    }

    /// Apply a batch of watched intervals reported by the video player.
    ///
    /// Reported intervals are merged with the stored set, so replays and
    /// out-of-order batches never inflate coverage, and seeking leaves
    /// uncounted gaps. Heartbeats against completed lessons are still merged
    /// but never regress the lesson status.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled` when the enrollment is missing or inactive,
    /// `LessonNotFound` when the lesson is not in the enrolled course,
    /// `WrongLessonType` for non-video lessons, and `Storage` for repository
    /// failures.
    pub async fn record_video_heartbeat(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
        reported: &[Interval],
        position_secs: u32,
    ) -> Result<VideoHeartbeat, ProgressError> {
        let now = self.clock.now();
        let mut enrollment = active_enrollment(&self.storage, enrollment_id).await?;
        let ctx = completion::load_course_context(&self.storage, enrollment.course_id()).await?;
        let lesson = ctx
            .structure
            .find_lesson(lesson_id)
            .ok_or(ProgressError::LessonNotFound)?;
        if lesson.lesson_type != LessonType::Video {
            return Err(ProgressError::WrongLessonType {
                expected: LessonType::Video,
                actual: lesson.lesson_type,
            });
        }

        let mut progress = progress_row(&self.storage, enrollment_id, lesson_id).await?;
        let merged = intervals::merge_with(progress.watched_intervals(), reported);
        let total = intervals::total_secs(&merged);
        let watched_pct = match lesson.duration_secs {
            Some(duration) if duration > 0 => {
                aggregate::round2((f64::from(total) / f64::from(duration) * 100.0).min(100.0))
            }
            _ => 0.0,
        };
        progress.record_watched(merged, total, watched_pct);
        if aggregate::is_lesson_complete(lesson, &progress, &ctx.policy) {
            progress.mark_completed(now);
        }
        let lesson_completed = progress.is_completed();
        self.storage.progress.upsert_progress(&progress).await?;

        enrollment.update_resume(lesson_id, position_secs);
        self.put_resume_best_effort(
            enrollment_id,
            &ResumeSnapshot {
                lesson_id,
                position_secs,
                updated_at: now,
            },
        )
        .await;

        let course_progress_pct =
            completion::recalculate(&self.storage, &mut enrollment, &ctx, now).await?;

        Ok(VideoHeartbeat {
            watched_pct,
            watch_duration_secs: total,
            lesson_completed,
            course_progress_pct,
        })
    }

    /// Apply a batch of viewed pages for a document lesson.
    ///
    /// PDF lessons accumulate unique page numbers against the catalog page
    /// count; text lessons complete on the first heartbeat. Pages outside
    /// `1..=total_pages` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled`, `LessonNotFound`, `WrongLessonType` for video,
    /// quiz, or SCORM lessons, and `Storage` for repository failures.
    pub async fn record_document_heartbeat(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
        pages: &[u32],
    ) -> Result<DocumentHeartbeat, ProgressError> {
        let now = self.clock.now();
        let mut enrollment = active_enrollment(&self.storage, enrollment_id).await?;
        let ctx = completion::load_course_context(&self.storage, enrollment.course_id()).await?;
        let lesson = ctx
            .structure
            .find_lesson(lesson_id)
            .ok_or(ProgressError::LessonNotFound)?;

        let mut progress = progress_row(&self.storage, enrollment_id, lesson_id).await?;
        let pages_pct = match lesson.lesson_type {
            LessonType::Pdf => {
                let total_pages = lesson.total_pages.unwrap_or(0);
                let mut viewed: BTreeSet<u32> = progress.pages_viewed().clone();
                viewed.extend(pages.iter().copied().filter(|p| (1..=total_pages).contains(p)));
                let pct = if total_pages > 0 {
                    aggregate::round2(
                        (viewed.len() as f64 / f64::from(total_pages) * 100.0).min(100.0),
                    )
                } else {
                    0.0
                };
                progress.record_pages(viewed, pct);
                pct
            }
            LessonType::Text => {
                // A text lesson is read by opening it.
                progress.mark_completed(now);
                100.0
            }
            other => {
                return Err(ProgressError::WrongLessonType {
                    expected: LessonType::Pdf,
                    actual: other,
                });
            }
        };
        if aggregate::is_lesson_complete(lesson, &progress, &ctx.policy) {
            progress.mark_completed(now);
        }
        let lesson_completed = progress.is_completed();
        self.storage.progress.upsert_progress(&progress).await?;

        enrollment.update_resume(lesson_id, 0);
        let course_progress_pct =
            completion::recalculate(&self.storage, &mut enrollment, &ctx, now).await?;

        Ok(DocumentHeartbeat {
            pages_pct,
            lesson_completed,
            course_progress_pct,
        })
    }

    /// Where to resume playback for an enrollment.
    ///
    /// Reads the cache first and falls back to the stored enrollment record
    /// when the cache is cold or unavailable.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled` when the enrollment is missing or inactive, and
    /// `Storage` for repository failures. Cache failures are logged, never
    /// surfaced.
    pub async fn resume_position(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<ResumePosition>, ProgressError> {
        let enrollment = active_enrollment(&self.storage, enrollment_id).await?;

        match self.cache.get_resume(enrollment_id).await {
            Ok(Some(snapshot)) => {
                return Ok(Some(ResumePosition {
                    lesson_id: snapshot.lesson_id,
                    position_secs: snapshot.position_secs,
                }));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "resume cache read failed, falling back to store");
            }
        }

        Ok(enrollment.last_lesson_id().map(|lesson_id| ResumePosition {
            lesson_id,
            position_secs: enrollment.last_position_secs().unwrap_or(0),
        }))
    }

    async fn put_resume_best_effort(&self, enrollment_id: EnrollmentId, snapshot: &ResumeSnapshot) {
        if let Err(e) = self.cache.put_resume(enrollment_id, snapshot).await {
            tracing::warn!(error = %e, "resume cache write failed");
        }
    }
}
