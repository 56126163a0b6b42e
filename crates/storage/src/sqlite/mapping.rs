use std::collections::BTreeSet;
use std::str::FromStr;

use progress_core::intervals::Interval;
use progress_core::model::{
    CourseId, CourseModule, Enrollment, EnrollmentId, LearnerId, Lesson, LessonId, LessonProgress,
    ModuleId, Question, Quiz, QuizAttempt, QuizId, ScormSession, SessionId, SubmittedAnswer,
};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::{CourseRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(value)
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {value}")))
}

fn uuid_col(row: &sqlx::sqlite::SqliteRow, field: &'static str) -> Result<Uuid, StorageError> {
    let text: String = row.try_get(field).map_err(ser)?;
    parse_uuid(field, &text)
}

fn opt_uuid_col(
    row: &sqlx::sqlite::SqliteRow,
    field: &'static str,
) -> Result<Option<Uuid>, StorageError> {
    let text: Option<String> = row.try_get(field).map_err(ser)?;
    text.map(|t| parse_uuid(field, &t)).transpose()
}

fn parse_enum<T>(value: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    value.parse().map_err(ser)
}

fn enum_col<T>(row: &sqlx::sqlite::SqliteRow, field: &'static str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    let text: String = row.try_get(field).map_err(ser)?;
    parse_enum(&text)
}

fn json_col<T: serde::de::DeserializeOwned>(
    row: &sqlx::sqlite::SqliteRow,
    field: &'static str,
) -> Result<T, StorageError> {
    let text: String = row.try_get(field).map_err(ser)?;
    serde_json::from_str(&text).map_err(ser)
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn u32_col(row: &sqlx::sqlite::SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    let value: i64 = row.try_get(field).map_err(ser)?;
    u32::try_from(value).map_err(|_| StorageError::Serialization(format!("invalid {field}: {value}")))
}

fn opt_u32_col(
    row: &sqlx::sqlite::SqliteRow,
    field: &'static str,
) -> Result<Option<u32>, StorageError> {
    let value: Option<i64> = row.try_get(field).map_err(ser)?;
    value
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
        })
        .transpose()
}

pub(crate) fn map_course_row(row: &sqlx::sqlite::SqliteRow) -> Result<CourseRecord, StorageError> {
    Ok(CourseRecord {
        course_id: CourseId::new(uuid_col(row, "id")?),
        title: row.try_get("title").map_err(ser)?,
        requires_approval: row.try_get("requires_approval").map_err(ser)?,
        completion_logic: json_col(row, "completion_logic")?,
    })
}

pub(crate) fn map_module_row(row: &sqlx::sqlite::SqliteRow) -> Result<CourseModule, StorageError> {
    Ok(CourseModule {
        module_id: ModuleId::new(uuid_col(row, "id")?),
        course_id: CourseId::new(uuid_col(row, "course_id")?),
        title: row.try_get("title").map_err(ser)?,
        sort_order: row.try_get("sort_order").map_err(ser)?,
    })
}

pub(crate) fn map_lesson_row(row: &sqlx::sqlite::SqliteRow) -> Result<Lesson, StorageError> {
    Ok(Lesson {
        lesson_id: LessonId::new(uuid_col(row, "id")?),
        module_id: ModuleId::new(uuid_col(row, "module_id")?),
        course_id: CourseId::new(uuid_col(row, "course_id")?),
        title: row.try_get("title").map_err(ser)?,
        lesson_type: enum_col(row, "lesson_type")?,
        duration_secs: opt_u32_col(row, "duration_secs")?,
        total_pages: opt_u32_col(row, "total_pages")?,
        sort_order: row.try_get("sort_order").map_err(ser)?,
        is_preview: row.try_get("is_preview").map_err(ser)?,
    })
}

pub(crate) fn map_quiz_row(row: &sqlx::sqlite::SqliteRow) -> Result<Quiz, StorageError> {
    let questions: Vec<Question> = json_col(row, "questions")?;
    Ok(Quiz {
        quiz_id: QuizId::new(uuid_col(row, "id")?),
        lesson_id: LessonId::new(uuid_col(row, "lesson_id")?),
        questions,
        passing_score: u32_col(row, "passing_score")?,
        max_attempts: opt_u32_col(row, "max_attempts")?,
        time_limit_secs: opt_u32_col(row, "time_limit_secs")?,
        randomize_order: row.try_get("randomize_order").map_err(ser)?,
        show_answers: enum_col(row, "show_answers")?,
    })
}

pub(crate) fn map_enrollment_row(row: &sqlx::sqlite::SqliteRow) -> Result<Enrollment, StorageError> {
    Ok(Enrollment::from_persisted(
        EnrollmentId::new(uuid_col(row, "id")?),
        LearnerId::new(uuid_col(row, "learner_id")?),
        CourseId::new(uuid_col(row, "course_id")?),
        row.try_get("progress_pct").map_err(ser)?,
        enum_col(row, "status")?,
        row.try_get("completed_at").map_err(ser)?,
        opt_uuid_col(row, "last_lesson_id")?.map(LessonId::new),
        opt_u32_col(row, "last_position_secs")?,
        row.try_get("created_at").map_err(ser)?,
    ))
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LessonProgress, StorageError> {
    let intervals: Vec<Interval> = json_col(row, "watched_intervals")?;
    let pages: BTreeSet<u32> = json_col(row, "pages_viewed")?;
    Ok(LessonProgress::from_persisted(
        EnrollmentId::new(uuid_col(row, "enrollment_id")?),
        LessonId::new(uuid_col(row, "lesson_id")?),
        enum_col(row, "status")?,
        u32_col(row, "watch_duration_secs")?,
        intervals,
        row.try_get("watched_pct").map_err(ser)?,
        pages,
        row.try_get("pages_pct").map_err(ser)?,
        opt_u32_col(row, "quiz_score")?,
        u32_col(row, "quiz_attempts")?,
        row.try_get("scorm_score").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    ))
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizAttempt, StorageError> {
    let answers: Vec<SubmittedAnswer> = json_col(row, "answers")?;
    Ok(QuizAttempt {
        quiz_id: QuizId::new(uuid_col(row, "quiz_id")?),
        enrollment_id: EnrollmentId::new(uuid_col(row, "enrollment_id")?),
        learner_id: LearnerId::new(uuid_col(row, "learner_id")?),
        attempt_number: u32_col(row, "attempt_number")?,
        answers,
        score: u32_col(row, "score")?,
        passed: row.try_get("passed").map_err(ser)?,
        correct_count: u32_col(row, "correct_count")?,
        total_questions: u32_col(row, "total_questions")?,
        time_taken_secs: opt_u32_col(row, "time_taken_secs")?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScormSession, StorageError> {
    Ok(ScormSession::from_persisted(
        SessionId::new(uuid_col(row, "id")?),
        EnrollmentId::new(uuid_col(row, "enrollment_id")?),
        LessonId::new(uuid_col(row, "lesson_id")?),
        enum_col(row, "status")?,
        json_col(row, "tracking_data")?,
        row.try_get("score_raw").map_err(ser)?,
        row.try_get("score_max").map_err(ser)?,
        row.try_get("score_min").map_err(ser)?,
        opt_u32_col(row, "total_time_secs")?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}
