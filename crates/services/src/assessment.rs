use std::sync::Arc;

use rand::seq::SliceRandom;

use progress_core::grading::{self, QuestionReview};
use progress_core::model::{
    EnrollmentId, LessonId, QuestionType, Quiz, QuizAttempt, QuizId, SubmittedAnswer,
};
use progress_storage::cache::ResumeCache;
use progress_storage::repository::{QuizAttemptDraft, Storage};

use crate::Clock;
use crate::completion::{self, active_enrollment, progress_row};
use crate::error::{ProgressError, map_not_found};

/// Slack added to the quiz time limit before a submission is rejected,
/// covering client clock skew and network latency.
const TIMER_GRACE_SECS: i64 = 30;

/// Runs the quiz lifecycle: start, submit, and attempt history.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    storage: Storage,
    cache: Arc<dyn ResumeCache>,
}

/// One question as presented to the learner: the answer key is stripped and
/// each entry carries its index in the stored bank so submissions survive
/// shuffling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedQuestion {
    pub question_index: usize,
    pub question_type: QuestionType,
    pub question: String,
    pub options: Vec<String>,
}

/// A started quiz, ready to be rendered by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedQuiz {
    pub quiz_id: QuizId,
    pub lesson_id: LessonId,
    /// The number the next submission will be recorded under.
    pub attempt_number: u32,
    pub total_questions: u32,
    pub passing_score: u32,
    pub time_limit_secs: Option<u32>,
    pub questions: Vec<PresentedQuestion>,
}

/// Result of grading and recording one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub attempt: QuizAttempt,
    /// Per-question feedback; `None` when the quiz policy withholds answers.
    pub review: Option<Vec<QuestionReview>>,
    pub lesson_completed: bool,
    pub course_progress_pct: f64,
}

impl AssessmentService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage, cache: Arc<dyn ResumeCache>) -> Self {
        Self {
            clock,
            storage,
            cache,
        }
    }

    /// Start a quiz attempt: validate access and attempt limits, strip the
    /// answer keys, shuffle the presentation when configured, and arm the
    /// timer.
    ///
    /// The timer marker is cache-backed and best-effort; if the cache is down
    /// the quiz still starts and the limit simply cannot be enforced for this
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled`, `QuizNotFound`, `MaxAttemptsReached`, or
    /// `Storage`.
    pub async fn start_quiz(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
    ) -> Result<StartedQuiz, ProgressError> {
        let now = self.clock.now();
        let enrollment = active_enrollment(&self.storage, enrollment_id).await?;
        let quiz = self.quiz_in_course(quiz_id, &enrollment).await?;

        let taken = self
            .storage
            .attempts
            .count_attempts(quiz_id, enrollment_id)
            .await?;
        if let Some(limit) = quiz.max_attempts
            && taken >= limit
        {
            return Err(ProgressError::MaxAttemptsReached { limit });
        }

        let mut order: Vec<usize> = (0..quiz.questions.len()).collect();
        if quiz.randomize_order {
            order.shuffle(&mut rand::rng());
        }
        let questions = order
            .into_iter()
            .map(|i| {
                let q = &quiz.questions[i];
                PresentedQuestion {
                    question_index: i,
                    question_type: q.key.question_type(),
                    question: q.question.clone(),
                    options: q.options.clone(),
                }
            })
            .collect();

        if let Err(e) = self.cache.put_quiz_started(enrollment_id, quiz_id, now).await {
            tracing::warn!(error = %e, "quiz timer cache write failed");
        }

        Ok(StartedQuiz {
            quiz_id,
            lesson_id: quiz.lesson_id,
            attempt_number: taken + 1,
            total_questions: quiz.total_questions(),
            passing_score: quiz.passing_score,
            time_limit_secs: quiz.time_limit_secs,
            questions,
        })
    }

    /// Grade a submission, record the attempt, and fold the result into the
    /// lesson and course progress.
    ///
    /// The time limit is enforced against the server-side start marker with
    /// a grace allowance; a missing marker (expired, or the cache was down at
    /// start) permits the submission.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled`, `QuizNotFound`, `MaxAttemptsReached`,
    /// `QuizTimeLimitExceeded`, or `Storage`.
    pub async fn submit_attempt(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
        answers: Vec<SubmittedAnswer>,
    ) -> Result<SubmissionOutcome, ProgressError> {
        let now = self.clock.now();
        let mut enrollment = active_enrollment(&self.storage, enrollment_id).await?;
        let quiz = self.quiz_in_course(quiz_id, &enrollment).await?;

        let taken = self
            .storage
            .attempts
            .count_attempts(quiz_id, enrollment_id)
            .await?;
        if let Some(limit) = quiz.max_attempts
            && taken >= limit
        {
            return Err(ProgressError::MaxAttemptsReached { limit });
        }

        let time_taken_secs = self.check_timer(enrollment_id, &quiz, now).await?;

        let graded = grading::grade(&quiz, &answers);
        let attempt = self
            .storage
            .attempts
            .record_attempt(QuizAttemptDraft {
                quiz_id,
                enrollment_id,
                learner_id: enrollment.learner_id(),
                answers,
                score: graded.score,
                passed: graded.passed,
                correct_count: graded.correct_count,
                total_questions: graded.total_questions,
                time_taken_secs,
                submitted_at: now,
            })
            .await?;

        let mut progress = progress_row(&self.storage, enrollment_id, quiz.lesson_id).await?;
        progress.record_quiz_attempt(graded.score, attempt.attempt_number);
        if graded.passed {
            progress.mark_completed(now);
        }
        let lesson_completed = progress.is_completed();
        self.storage.progress.upsert_progress(&progress).await?;

        if let Err(e) = self.cache.clear_quiz_started(enrollment_id, quiz_id).await {
            tracing::warn!(error = %e, "quiz timer cache clear failed");
        }

        let ctx = completion::load_course_context(&self.storage, enrollment.course_id()).await?;
        let course_progress_pct =
            completion::recalculate(&self.storage, &mut enrollment, &ctx, now).await?;

        let review = grading::review(&quiz, &attempt.answers, graded.passed);
        Ok(SubmissionOutcome {
            attempt,
            review,
            lesson_completed,
            course_progress_pct,
        })
    }

    /// Full attempt history for the learner on one quiz, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled`, `QuizNotFound`, or `Storage`.
    pub async fn attempt_history(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttempt>, ProgressError> {
        let enrollment = active_enrollment(&self.storage, enrollment_id).await?;
        self.quiz_in_course(quiz_id, &enrollment).await?;
        Ok(self
            .storage
            .attempts
            .attempts_for(quiz_id, enrollment_id)
            .await?)
    }

    async fn quiz_in_course(
        &self,
        quiz_id: QuizId,
        enrollment: &progress_core::model::Enrollment,
    ) -> Result<Quiz, ProgressError> {
        let quiz = self
            .storage
            .catalog
            .get_quiz(quiz_id)
            .await
            .map_err(|e| map_not_found(e, ProgressError::QuizNotFound))?;
        let lesson = self
            .storage
            .catalog
            .get_lesson(quiz.lesson_id)
            .await
            .map_err(|e| map_not_found(e, ProgressError::QuizNotFound))?;
        if lesson.course_id != enrollment.course_id() {
            return Err(ProgressError::QuizNotFound);
        }
        Ok(quiz)
    }

    async fn check_timer(
        &self,
        enrollment_id: EnrollmentId,
        quiz: &Quiz,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<u32>, ProgressError> {
        let started_at = match self.cache.get_quiz_started(enrollment_id, quiz.quiz_id).await {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!(error = %e, "quiz timer cache read failed, skipping limit check");
                None
            }
        };
        let Some(started_at) = started_at else {
            return Ok(None);
        };

        let elapsed = (now - started_at).num_seconds().max(0);
        if let Some(limit) = quiz.time_limit_secs
            && elapsed > i64::from(limit) + TIMER_GRACE_SECS
        {
            return Err(ProgressError::QuizTimeLimitExceeded { limit_secs: limit });
        }
        Ok(u32::try_from(elapsed).ok())
    }
}
