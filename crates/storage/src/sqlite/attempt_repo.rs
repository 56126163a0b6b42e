use progress_core::model::{EnrollmentId, QuizAttempt, QuizId};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{map_attempt_row, ser, to_json},
};
use crate::repository::{QuizAttemptDraft, QuizAttemptRepository, StorageError};

#[async_trait::async_trait]
impl QuizAttemptRepository for SqliteRepository {
    async fn record_attempt(&self, draft: QuizAttemptDraft) -> Result<QuizAttempt, StorageError> {
        // Single INSERT ... SELECT so allocation and insertion are one atomic
        // statement; SQLite serializes writers, and the UNIQUE constraint on
        // (quiz_id, enrollment_id, attempt_number) backstops it.
        let row = sqlx::query(
            r"
            INSERT INTO quiz_attempts (
                quiz_id, enrollment_id, learner_id, attempt_number, answers,
                score, passed, correct_count, total_questions, time_taken_secs,
                submitted_at
            )
            SELECT ?1, ?2, ?3, COALESCE(MAX(attempt_number), 0) + 1, ?4, ?5,
                   ?6, ?7, ?8, ?9, ?10
            FROM quiz_attempts
            WHERE quiz_id = ?1 AND enrollment_id = ?2
            RETURNING attempt_number
            ",
        )
        .bind(draft.quiz_id.value().to_string())
        .bind(draft.enrollment_id.value().to_string())
        .bind(draft.learner_id.value().to_string())
        .bind(to_json(&draft.answers)?)
        .bind(i64::from(draft.score))
        .bind(draft.passed)
        .bind(i64::from(draft.correct_count))
        .bind(i64::from(draft.total_questions))
        .bind(draft.time_taken_secs.map(i64::from))
        .bind(draft.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let number: i64 = row.try_get("attempt_number").map_err(ser)?;
        let number = u32::try_from(number)
            .map_err(|_| StorageError::Serialization(format!("invalid attempt_number: {number}")))?;

        Ok(QuizAttempt {
            quiz_id: draft.quiz_id,
            enrollment_id: draft.enrollment_id,
            learner_id: draft.learner_id,
            attempt_number: number,
            answers: draft.answers,
            score: draft.score,
            passed: draft.passed,
            correct_count: draft.correct_count,
            total_questions: draft.total_questions,
            time_taken_secs: draft.time_taken_secs,
            submitted_at: draft.submitted_at,
        })
    }

    async fn count_attempts(
        &self,
        quiz_id: QuizId,
        enrollment_id: EnrollmentId,
    ) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS n
            FROM quiz_attempts
            WHERE quiz_id = ?1 AND enrollment_id = ?2
            ",
        )
        .bind(quiz_id.value().to_string())
        .bind(enrollment_id.value().to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let count: i64 = row.try_get("n").map_err(ser)?;
        u32::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("invalid attempt count: {count}")))
    }

    async fn attempts_for(
        &self,
        quiz_id: QuizId,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT quiz_id, enrollment_id, learner_id, attempt_number, answers,
                   score, passed, correct_count, total_questions,
                   time_taken_secs, submitted_at
            FROM quiz_attempts
            WHERE quiz_id = ?1 AND enrollment_id = ?2
            ORDER BY attempt_number ASC
            ",
        )
        .bind(quiz_id.value().to_string())
        .bind(enrollment_id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }
}
