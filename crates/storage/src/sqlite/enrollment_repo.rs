use progress_core::model::{CourseId, Enrollment, EnrollmentId, LearnerId};

use super::{SqliteRepository, mapping::map_enrollment_row};
use crate::repository::{EnrollmentRepository, StorageError};

fn storage_err(e: sqlx::Error) -> StorageError {
    if e.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
    {
        StorageError::Conflict
    } else {
        StorageError::Connection(e.to_string())
    }
}

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn upsert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (
                id, learner_id, course_id, progress_pct, status, completed_at,
                last_lesson_id, last_position_secs, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                -- learner/course/created_at are immutable after the insert
                progress_pct = excluded.progress_pct,
                status = excluded.status,
                completed_at = excluded.completed_at,
                last_lesson_id = excluded.last_lesson_id,
                last_position_secs = excluded.last_position_secs
            ",
        )
        .bind(enrollment.enrollment_id().value().to_string())
        .bind(enrollment.learner_id().value().to_string())
        .bind(enrollment.course_id().value().to_string())
        .bind(enrollment.progress_pct())
        .bind(enrollment.status().as_str())
        .bind(enrollment.completed_at())
        .bind(enrollment.last_lesson_id().map(|l| l.value().to_string()))
        .bind(enrollment.last_position_secs().map(i64::from))
        .bind(enrollment.created_at())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, learner_id, course_id, progress_pct, status, completed_at,
                   last_lesson_id, last_position_secs, created_at
            FROM enrollments
            WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_enrollment_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn find_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, learner_id, course_id, progress_pct, status, completed_at,
                   last_lesson_id, last_position_secs, created_at
            FROM enrollments
            WHERE learner_id = ?1 AND course_id = ?2
            ",
        )
        .bind(learner_id.value().to_string())
        .bind(course_id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_enrollment_row(&row)).transpose()
    }
}
