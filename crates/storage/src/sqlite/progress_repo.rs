use progress_core::model::{EnrollmentId, LessonId, LessonProgress};

use super::{
    SqliteRepository,
    mapping::{map_progress_row, to_json},
};
use crate::repository::{LessonProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = r"
    enrollment_id, lesson_id, status, watch_duration_secs, watched_intervals,
    watched_pct, pages_viewed, pages_pct, quiz_score, quiz_attempts,
    scorm_score, completed_at
";

#[async_trait::async_trait]
impl LessonProgressRepository for SqliteRepository {
    async fn upsert_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_progress (
                enrollment_id, lesson_id, status, watch_duration_secs,
                watched_intervals, watched_pct, pages_viewed, pages_pct,
                quiz_score, quiz_attempts, scorm_score, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(enrollment_id, lesson_id) DO UPDATE SET
                status = excluded.status,
                watch_duration_secs = excluded.watch_duration_secs,
                watched_intervals = excluded.watched_intervals,
                watched_pct = excluded.watched_pct,
                pages_viewed = excluded.pages_viewed,
                pages_pct = excluded.pages_pct,
                quiz_score = excluded.quiz_score,
                quiz_attempts = excluded.quiz_attempts,
                scorm_score = excluded.scorm_score,
                completed_at = excluded.completed_at
            ",
        )
        .bind(progress.enrollment_id().value().to_string())
        .bind(progress.lesson_id().value().to_string())
        .bind(progress.status().as_str())
        .bind(i64::from(progress.watch_duration_secs()))
        .bind(to_json(&progress.watched_intervals())?)
        .bind(progress.watched_pct())
        .bind(to_json(&progress.pages_viewed())?)
        .bind(progress.pages_pct())
        .bind(progress.quiz_score().map(i64::from))
        .bind(i64::from(progress.quiz_attempts()))
        .bind(progress.scorm_score())
        .bind(progress.completed_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_progress(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE enrollment_id = ?1 AND lesson_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(enrollment_id.value().to_string())
            .bind(lesson_id.value().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_progress_row(&row)).transpose()
    }

    async fn progress_for_enrollment(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let sql = format!("SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE enrollment_id = ?1");
        let rows = sqlx::query(&sql)
            .bind(enrollment_id.value().to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }
}
