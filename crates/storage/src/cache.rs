//! Best-effort cache for hot player state.
//!
//! The cache holds resume positions and quiz start markers. It is never
//! authoritative: callers treat every write failure as survivable and fall
//! back to the repositories on read failures, so a cold or broken cache
//! degrades latency, not correctness.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_core::model::{EnrollmentId, LessonId, QuizId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by cache adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Last playback position for an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSnapshot {
    pub lesson_id: LessonId,
    pub position_secs: u32,
    pub updated_at: DateTime<Utc>,
}

/// Cache contract for resume positions and quiz timers.
#[async_trait]
pub trait ResumeCache: Send + Sync {
    /// Store the latest resume position for an enrollment.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when the cache backend is unreachable.
    async fn put_resume(
        &self,
        enrollment_id: EnrollmentId,
        snapshot: &ResumeSnapshot,
    ) -> Result<(), CacheError>;

    /// Read the cached resume position, if any.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when the cache backend is unreachable.
    async fn get_resume(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<ResumeSnapshot>, CacheError>;

    /// Record when a quiz was started for an enrollment.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when the cache backend is unreachable.
    async fn put_quiz_started(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
        started_at: DateTime<Utc>,
    ) -> Result<(), CacheError>;

    /// Read the start marker for a quiz, if still present.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when the cache backend is unreachable.
    async fn get_quiz_started(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
    ) -> Result<Option<DateTime<Utc>>, CacheError>;

    /// Drop the start marker after a submission.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when the cache backend is unreachable.
    async fn clear_quiz_started(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
    ) -> Result<(), CacheError>;
}

/// In-process cache backend.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    resume: Arc<Mutex<HashMap<EnrollmentId, ResumeSnapshot>>>,
    quiz_starts: Arc<Mutex<HashMap<(EnrollmentId, QuizId), DateTime<Utc>>>>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, CacheError> {
    mutex
        .lock()
        .map_err(|e| CacheError::Unavailable(e.to_string()))
}

#[async_trait]
impl ResumeCache for InMemoryCache {
    async fn put_resume(
        &self,
        enrollment_id: EnrollmentId,
        snapshot: &ResumeSnapshot,
    ) -> Result<(), CacheError> {
        lock(&self.resume)?.insert(enrollment_id, snapshot.clone());
        Ok(())
    }

    async fn get_resume(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<ResumeSnapshot>, CacheError> {
        Ok(lock(&self.resume)?.get(&enrollment_id).cloned())
    }

    async fn put_quiz_started(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
        started_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        lock(&self.quiz_starts)?.insert((enrollment_id, quiz_id), started_at);
        Ok(())
    }

    async fn get_quiz_started(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
    ) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(lock(&self.quiz_starts)?
            .get(&(enrollment_id, quiz_id))
            .copied())
    }

    async fn clear_quiz_started(
        &self,
        enrollment_id: EnrollmentId,
        quiz_id: QuizId,
    ) -> Result<(), CacheError> {
        lock(&self.quiz_starts)?.remove(&(enrollment_id, quiz_id));
        Ok(())
    }
}

/// Cache backend that fails every call; used to exercise degraded-cache
/// paths in service tests.
#[derive(Clone, Copy, Default)]
pub struct UnavailableCache;

#[async_trait]
impl ResumeCache for UnavailableCache {
    async fn put_resume(
        &self,
        _enrollment_id: EnrollmentId,
        _snapshot: &ResumeSnapshot,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }

    async fn get_resume(
        &self,
        _enrollment_id: EnrollmentId,
    ) -> Result<Option<ResumeSnapshot>, CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }

    async fn put_quiz_started(
        &self,
        _enrollment_id: EnrollmentId,
        _quiz_id: QuizId,
        _started_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }

    async fn get_quiz_started(
        &self,
        _enrollment_id: EnrollmentId,
        _quiz_id: QuizId,
    ) -> Result<Option<DateTime<Utc>>, CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }

    async fn clear_quiz_started(
        &self,
        _enrollment_id: EnrollmentId,
        _quiz_id: QuizId,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".into()))
    }
}
