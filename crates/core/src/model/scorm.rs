use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::enums::ScormSessionStatus;
use super::ids::{EnrollmentId, LessonId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScormSessionError {
    /// Guard against replayed runtime commits after finalization.
    #[error("SCORM session is already completed")]
    AlreadyCompleted,
}

/// One incremental commit from the SCORM runtime API (`LMSCommit` / `Commit`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScormCommit {
    /// Runtime data-model keys (`cmi.*`); merged into the session key-by-key.
    #[serde(default)]
    pub tracking_data: BTreeMap<String, serde_json::Value>,
    pub score_raw: Option<i32>,
    pub score_max: Option<i32>,
    pub score_min: Option<i32>,
    /// `"completed"` finalizes the session.
    pub completion_status: Option<String>,
    /// `"failed"` marks the session failed.
    pub success_status: Option<String>,
    pub total_time_secs: Option<u32>,
}

/// A SCORM runtime session for one (enrollment, lesson).
///
/// Reused across commits while open; once `Completed` or `Failed` a new
/// session must be opened for further attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ScormSession {
    session_id: SessionId,
    enrollment_id: EnrollmentId,
    lesson_id: LessonId,
    status: ScormSessionStatus,
    tracking_data: BTreeMap<String, serde_json::Value>,
    score_raw: Option<i32>,
    score_max: Option<i32>,
    score_min: Option<i32>,
    total_time_secs: Option<u32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ScormSession {
    /// Open a fresh session in the `Initialized` state.
    #[must_use]
    pub fn open(enrollment_id: EnrollmentId, lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            session_id: SessionId::generate(),
            enrollment_id,
            lesson_id,
            status: ScormSessionStatus::Initialized,
            tracking_data: BTreeMap::new(),
            score_raw: None,
            score_max: None,
            score_min: None,
            total_time_secs: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a session from persisted storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        session_id: SessionId,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
        status: ScormSessionStatus,
        tracking_data: BTreeMap<String, serde_json::Value>,
        score_raw: Option<i32>,
        score_max: Option<i32>,
        score_min: Option<i32>,
        total_time_secs: Option<u32>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            enrollment_id,
            lesson_id,
            status,
            tracking_data,
            score_raw,
            score_max,
            score_min,
            total_time_secs,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
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
    pub fn status(&self) -> ScormSessionStatus {
        self.status
    }

    #[must_use]
    pub fn tracking_data(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.tracking_data
    }

    #[must_use]
    pub fn score_raw(&self) -> Option<i32> {
        self.score_raw
    }

    #[must_use]
    pub fn score_max(&self) -> Option<i32> {
        self.score_max
    }

    #[must_use]
    pub fn score_min(&self) -> Option<i32> {
        self.score_min
    }

    #[must_use]
    pub fn total_time_secs(&self) -> Option<u32> {
        self.total_time_secs
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply one runtime commit.
    ///
    /// Tracking data is merged key-by-key: new values overwrite old ones and
    /// keys absent from the commit persist. Score and time fields overwrite
    /// only when present. A `"completed"` completion status finalizes the
    /// session; a `"failed"` success status fails it; otherwise the first
    /// commit moves `Initialized` to `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `ScormSessionError::AlreadyCompleted` when the session was
    /// already finalized — replayed commits must not mutate finished state.
    pub fn apply_commit(
        &mut self,
        commit: ScormCommit,
        now: DateTime<Utc>,
    ) -> Result<(), ScormSessionError> {
        if self.status == ScormSessionStatus::Completed {
            return Err(ScormSessionError::AlreadyCompleted);
        }

        self.tracking_data.extend(commit.tracking_data);
        if commit.score_raw.is_some() {
            self.score_raw = commit.score_raw;
        }
        if commit.score_max.is_some() {
            self.score_max = commit.score_max;
        }
        if commit.score_min.is_some() {
            self.score_min = commit.score_min;
        }
        if commit.total_time_secs.is_some() {
            self.total_time_secs = commit.total_time_secs;
        }

        if commit.completion_status.as_deref() == Some("completed") {
            self.status = ScormSessionStatus::Completed;
        } else if self.status == ScormSessionStatus::Initialized {
            self.status = ScormSessionStatus::InProgress;
        }
        if commit.success_status.as_deref() == Some("failed") {
            self.status = ScormSessionStatus::Failed;
        }

        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use serde_json::json;

    fn session() -> ScormSession {
        ScormSession::open(EnrollmentId::generate(), LessonId::generate(), fixed_now())
    }

    fn commit_with(entries: &[(&str, serde_json::Value)]) -> ScormCommit {
        ScormCommit {
            tracking_data: entries
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
            ..ScormCommit::default()
        }
    }

    #[test]
    fn first_commit_moves_to_in_progress() {
        let mut s = session();
        s.apply_commit(commit_with(&[("cmi.location", json!("page-3"))]), fixed_now())
            .unwrap();
        assert_eq!(s.status(), ScormSessionStatus::InProgress);
    }

    #[test]
    fn commit_merges_without_erasing_absent_keys() {
        let mut s = session();
        s.apply_commit(
            commit_with(&[("cmi.location", json!("a")), ("cmi.suspend_data", json!("x"))]),
            fixed_now(),
        )
        .unwrap();
        s.apply_commit(commit_with(&[("cmi.location", json!("b"))]), fixed_now())
            .unwrap();

        assert_eq!(s.tracking_data()["cmi.location"], json!("b"));
        assert_eq!(s.tracking_data()["cmi.suspend_data"], json!("x"));
    }

    #[test]
    fn completed_status_finalizes_and_blocks_replay() {
        let mut s = session();
        let commit = ScormCommit {
            score_raw: Some(87),
            completion_status: Some("completed".into()),
            ..ScormCommit::default()
        };
        s.apply_commit(commit, fixed_now()).unwrap();
        assert_eq!(s.status(), ScormSessionStatus::Completed);
        assert_eq!(s.score_raw(), Some(87));

        let replay = s.apply_commit(ScormCommit::default(), fixed_now());
        assert_eq!(replay, Err(ScormSessionError::AlreadyCompleted));
    }

    #[test]
    fn failed_success_status_fails_the_session() {
        let mut s = session();
        let commit = ScormCommit {
            success_status: Some("failed".into()),
            ..ScormCommit::default()
        };
        s.apply_commit(commit, fixed_now()).unwrap();
        assert_eq!(s.status(), ScormSessionStatus::Failed);

        // A failed session is closed but not completed; a new session would
        // be opened for the next attempt. Further commits are still merged.
        assert!(s.apply_commit(ScormCommit::default(), fixed_now()).is_ok());
    }
}
