use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_core::model::{
    CourseId, CourseModule, CourseStructure, Enrollment, EnrollmentId, LearnerId, Lesson, LessonId,
    LessonProgress, ModuleId, Quiz, QuizAttempt, QuizId, ScormSession, SessionId, SubmittedAnswer,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a course as the catalog publishes it.
///
/// Only the fields the progress engine consumes are kept here; the catalog
/// service owns the full course document.
#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub course_id: CourseId,
    pub title: String,
    pub requires_approval: bool,
    /// Raw `completion_logic` JSON; parsed into a policy at the service layer.
    pub completion_logic: serde_json::Value,
}

/// A graded submission awaiting an attempt number.
///
/// The repository allocates the number while inserting so concurrent
/// submissions for the same (quiz, enrollment) can never collide.
#[derive(Debug, Clone)]
pub struct QuizAttemptDraft {
    pub quiz_id: QuizId,
    pub enrollment_id: EnrollmentId,
    pub learner_id: LearnerId,
    pub answers: Vec<SubmittedAnswer>,
    pub score: u32,
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
    pub time_taken_secs: Option<u32>,
    pub submitted_at: DateTime<Utc>,
}

impl QuizAttemptDraft {
    #[must_use]
    fn into_attempt(self, attempt_number: u32) -> QuizAttempt {
        QuizAttempt {
            quiz_id: self.quiz_id,
            enrollment_id: self.enrollment_id,
            learner_id: self.learner_id,
            attempt_number,
            answers: self.answers,
            score: self.score,
            passed: self.passed,
            correct_count: self.correct_count,
            total_questions: self.total_questions,
            time_taken_secs: self.time_taken_secs,
            submitted_at: self.submitted_at,
        }
    }
}

/// Repository contract for enrollments.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Persist or update an enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when a different enrollment already
    /// exists for the same (learner, course) pair.
    async fn upsert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// Fetch an enrollment by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment, StorageError>;

    /// Find the enrollment for a (learner, course) pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;
}

/// Repository contract for per-lesson progress rows.
#[async_trait]
pub trait LessonProgressRepository: Send + Sync {
    /// Persist or update a progress row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(&self, progress: &LessonProgress) -> Result<(), StorageError>;

    /// Fetch the progress row for one (enrollment, lesson), if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_progress(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Every progress row recorded for an enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the scan fails.
    async fn progress_for_enrollment(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LessonProgress>, StorageError>;
}

/// Repository contract for graded quiz attempts.
#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Insert a graded attempt, allocating the next attempt number.
    ///
    /// Allocation and insertion happen atomically so two concurrent
    /// submissions get distinct consecutive numbers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn record_attempt(&self, draft: QuizAttemptDraft) -> Result<QuizAttempt, StorageError>;

    /// Number of attempts recorded for one (quiz, enrollment).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the count fails.
    async fn count_attempts(
        &self,
        quiz_id: QuizId,
        enrollment_id: EnrollmentId,
    ) -> Result<u32, StorageError>;

    /// Full attempt history for one (quiz, enrollment), ordered by attempt
    /// number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the scan fails.
    async fn attempts_for(
        &self,
        quiz_id: QuizId,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<QuizAttempt>, StorageError>;
}

/// Repository contract for SCORM runtime sessions.
#[async_trait]
pub trait ScormSessionRepository: Send + Sync {
    /// Persist or update a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn upsert_session(&self, session: &ScormSession) -> Result<(), StorageError>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<ScormSession, StorageError>;

    /// Find an open (initialized or in-progress) session for one
    /// (enrollment, lesson), if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_open_session(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<ScormSession>, StorageError>;
}

/// Repository contract for the course catalog the engine reads.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Persist or update a course record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), StorageError>;

    /// Persist or update a module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the module cannot be stored.
    async fn upsert_module(&self, module: &CourseModule) -> Result<(), StorageError>;

    /// Persist or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Persist or update a quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// Fetch a course record by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_course(&self, id: CourseId) -> Result<CourseRecord, StorageError>;

    /// Load the full module/lesson snapshot for a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown course, or other
    /// storage errors.
    async fn course_structure(&self, id: CourseId) -> Result<CourseStructure, StorageError>;

    /// Fetch a lesson by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StorageError>;

    /// Fetch a quiz by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, CourseRecord>>>,
    modules: Arc<Mutex<HashMap<ModuleId, CourseModule>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    quizzes: Arc<Mutex<HashMap<QuizId, Quiz>>>,
    enrollments: Arc<Mutex<HashMap<EnrollmentId, Enrollment>>>,
    progress: Arc<Mutex<HashMap<(EnrollmentId, LessonId), LessonProgress>>>,
    attempts: Arc<Mutex<HashMap<(QuizId, EnrollmentId), Vec<QuizAttempt>>>>,
    sessions: Arc<Mutex<HashMap<SessionId, ScormSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn upsert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = lock(&self.enrollments)?;
        let duplicate = guard.values().any(|existing| {
            existing.enrollment_id() != enrollment.enrollment_id()
                && existing.learner_id() == enrollment.learner_id()
                && existing.course_id() == enrollment.course_id()
        });
        if duplicate {
            return Err(StorageError::Conflict);
        }
        guard.insert(enrollment.enrollment_id(), enrollment.clone());
        Ok(())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment, StorageError> {
        let guard = lock(&self.enrollments)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = lock(&self.enrollments)?;
        Ok(guard
            .values()
            .find(|e| e.learner_id() == learner_id && e.course_id() == course_id)
            .cloned())
    }
}

#[async_trait]
impl LessonProgressRepository for InMemoryRepository {
    async fn upsert_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let mut guard = lock(&self.progress)?;
        guard.insert(
            (progress.enrollment_id(), progress.lesson_id()),
            progress.clone(),
        );
        Ok(())
    }

    async fn get_progress(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(guard.get(&(enrollment_id, lesson_id)).cloned())
    }

    async fn progress_for_enrollment(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(guard
            .values()
            .filter(|p| p.enrollment_id() == enrollment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryRepository {
    async fn record_attempt(&self, draft: QuizAttemptDraft) -> Result<QuizAttempt, StorageError> {
        // The mutex serializes allocation; numbers stay consecutive.
        let mut guard = lock(&self.attempts)?;
        let history = guard
            .entry((draft.quiz_id, draft.enrollment_id))
            .or_default();
        let number = u32::try_from(history.len())
            .map_err(|_| StorageError::Serialization("attempt count overflow".into()))?
            + 1;
        let attempt = draft.into_attempt(number);
        history.push(attempt.clone());
        Ok(attempt)
    }

    async fn count_attempts(
        &self,
        quiz_id: QuizId,
        enrollment_id: EnrollmentId,
    ) -> Result<u32, StorageError> {
        let guard = lock(&self.attempts)?;
        let count = guard
            .get(&(quiz_id, enrollment_id))
            .map_or(0, |history| history.len());
        u32::try_from(count).map_err(|_| StorageError::Serialization("attempt count overflow".into()))
    }

    async fn attempts_for(
        &self,
        quiz_id: QuizId,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let guard = lock(&self.attempts)?;
        Ok(guard.get(&(quiz_id, enrollment_id)).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ScormSessionRepository for InMemoryRepository {
    async fn upsert_session(&self, session: &ScormSession) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        guard.insert(session.session_id(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<ScormSession, StorageError> {
        let guard = lock(&self.sessions)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_open_session(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<ScormSession>, StorageError> {
        let guard = lock(&self.sessions)?;
        Ok(guard
            .values()
            .find(|s| {
                s.enrollment_id() == enrollment_id
                    && s.lesson_id() == lesson_id
                    && s.status().is_open()
            })
            .cloned())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), StorageError> {
        let mut guard = lock(&self.courses)?;
        guard.insert(course.course_id, course.clone());
        Ok(())
    }

    async fn upsert_module(&self, module: &CourseModule) -> Result<(), StorageError> {
        let mut guard = lock(&self.modules)?;
        guard.insert(module.module_id, module.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = lock(&self.lessons)?;
        guard.insert(lesson.lesson_id, lesson.clone());
        Ok(())
    }

    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = lock(&self.quizzes)?;
        guard.insert(quiz.quiz_id, quiz.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<CourseRecord, StorageError> {
        let guard = lock(&self.courses)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn course_structure(&self, id: CourseId) -> Result<CourseStructure, StorageError> {
        {
            let courses = lock(&self.courses)?;
            if !courses.contains_key(&id) {
                return Err(StorageError::NotFound);
            }
        }
        let modules = lock(&self.modules)?
            .values()
            .filter(|m| m.course_id == id)
            .cloned()
            .collect();
        let lessons = lock(&self.lessons)?
            .values()
            .filter(|l| l.course_id == id)
            .cloned()
            .collect();
        Ok(CourseStructure::new(id, modules, lessons))
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StorageError> {
        let guard = lock(&self.lessons)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let guard = lock(&self.quizzes)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

/// Aggregates the repository ports behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub progress: Arc<dyn LessonProgressRepository>,
    pub attempts: Arc<dyn QuizAttemptRepository>,
    pub scorm_sessions: Arc<dyn ScormSessionRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self::from_repo(repo)
    }

    fn from_repo<R>(repo: R) -> Self
    where
        R: EnrollmentRepository
            + LessonProgressRepository
            + QuizAttemptRepository
            + ScormSessionRepository
            + CatalogRepository
            + Clone
            + 'static,
    {
        Self {
            enrollments: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            scorm_sessions: Arc::new(repo.clone()),
            catalog: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::time::fixed_now;

    fn draft(quiz_id: QuizId, enrollment_id: EnrollmentId, score: u32) -> QuizAttemptDraft {
        QuizAttemptDraft {
            quiz_id,
            enrollment_id,
            learner_id: LearnerId::generate(),
            answers: Vec::new(),
            score,
            passed: score >= 70,
            correct_count: score / 10,
            total_questions: 10,
            time_taken_secs: None,
            submitted_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn enrollment_upsert_rejects_second_enrollment_for_same_pair() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::generate();
        let course = CourseId::generate();

        let first = Enrollment::new(learner, course, false, fixed_now());
        repo.upsert_enrollment(&first).await.unwrap();

        // Re-saving the same enrollment is fine.
        repo.upsert_enrollment(&first).await.unwrap();

        let second = Enrollment::new(learner, course, false, fixed_now());
        assert!(matches!(
            repo.upsert_enrollment(&second).await,
            Err(StorageError::Conflict)
        ));
    }

    #[tokio::test]
    async fn attempt_numbers_are_consecutive_per_quiz_and_enrollment() {
        let repo = InMemoryRepository::new();
        let quiz = QuizId::generate();
        let enrollment = EnrollmentId::generate();

        let a1 = repo.record_attempt(draft(quiz, enrollment, 40)).await.unwrap();
        let a2 = repo.record_attempt(draft(quiz, enrollment, 80)).await.unwrap();
        assert_eq!(a1.attempt_number, 1);
        assert_eq!(a2.attempt_number, 2);

        let other = EnrollmentId::generate();
        let b1 = repo.record_attempt(draft(quiz, other, 50)).await.unwrap();
        assert_eq!(b1.attempt_number, 1);

        assert_eq!(repo.count_attempts(quiz, enrollment).await.unwrap(), 2);
        let history = repo.attempts_for(quiz, enrollment).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].score, 80);
    }

    #[tokio::test]
    async fn open_scorm_session_lookup_skips_finished_sessions() {
        let repo = InMemoryRepository::new();
        let enrollment = EnrollmentId::generate();
        let lesson = LessonId::generate();

        let mut finished = ScormSession::open(enrollment, lesson, fixed_now());
        finished
            .apply_commit(
                progress_core::model::ScormCommit {
                    completion_status: Some("completed".into()),
                    ..Default::default()
                },
                fixed_now(),
            )
            .unwrap();
        repo.upsert_session(&finished).await.unwrap();
        assert!(repo.find_open_session(enrollment, lesson).await.unwrap().is_none());

        let open = ScormSession::open(enrollment, lesson, fixed_now());
        repo.upsert_session(&open).await.unwrap();
        let found = repo.find_open_session(enrollment, lesson).await.unwrap();
        assert_eq!(found.map(|s| s.session_id()), Some(open.session_id()));
    }
}
