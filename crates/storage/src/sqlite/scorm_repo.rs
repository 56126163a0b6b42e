use progress_core::model::{EnrollmentId, LessonId, ScormSession, SessionId};

use super::{
    SqliteRepository,
    mapping::{map_session_row, to_json},
};
use crate::repository::{ScormSessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    id, enrollment_id, lesson_id, status, tracking_data, score_raw, score_max,
    score_min, total_time_secs, created_at, updated_at
";

#[async_trait::async_trait]
impl ScormSessionRepository for SqliteRepository {
    async fn upsert_session(&self, session: &ScormSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO scorm_sessions (
                id, enrollment_id, lesson_id, status, tracking_data, score_raw,
                score_max, score_min, total_time_secs, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                tracking_data = excluded.tracking_data,
                score_raw = excluded.score_raw,
                score_max = excluded.score_max,
                score_min = excluded.score_min,
                total_time_secs = excluded.total_time_secs,
                updated_at = excluded.updated_at
            ",
        )
        .bind(session.session_id().value().to_string())
        .bind(session.enrollment_id().value().to_string())
        .bind(session.lesson_id().value().to_string())
        .bind(session.status().as_str())
        .bind(to_json(session.tracking_data())?)
        .bind(session.score_raw())
        .bind(session.score_max())
        .bind(session.score_min())
        .bind(session.total_time_secs().map(i64::from))
        .bind(session.created_at())
        .bind(session.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<ScormSession, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM scorm_sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.value().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_session_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn find_open_session(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<ScormSession>, StorageError> {
        let sql = format!(
            r"
            SELECT {SESSION_COLUMNS}
            FROM scorm_sessions
            WHERE enrollment_id = ?1
              AND lesson_id = ?2
              AND status IN ('INITIALIZED', 'IN_PROGRESS')
            ORDER BY created_at DESC
            LIMIT 1
            "
        );
        let row = sqlx::query(&sql)
            .bind(enrollment_id.value().to_string())
            .bind(lesson_id.value().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_session_row(&row)).transpose()
    }
}
