use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (catalog tables, enrollments, lesson progress,
/// quiz attempts, SCORM sessions, and indexes). Identifiers are UUIDs stored
/// as TEXT; JSON blobs (question banks, interval sets, tracking data) are
/// stored as TEXT.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS courses (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    requires_approval INTEGER NOT NULL CHECK (requires_approval IN (0, 1)),
                    completion_logic TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS course_modules (
                    id TEXT PRIMARY KEY,
                    course_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    sort_order INTEGER NOT NULL,
                    FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lessons (
                    id TEXT PRIMARY KEY,
                    module_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    lesson_type TEXT NOT NULL,
                    duration_secs INTEGER,
                    total_pages INTEGER,
                    sort_order INTEGER NOT NULL,
                    is_preview INTEGER NOT NULL CHECK (is_preview IN (0, 1)),
                    FOREIGN KEY (module_id) REFERENCES course_modules(id) ON DELETE CASCADE,
                    FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quizzes (
                    id TEXT PRIMARY KEY,
                    lesson_id TEXT NOT NULL,
                    questions TEXT NOT NULL,
                    passing_score INTEGER NOT NULL CHECK (passing_score BETWEEN 0 AND 100),
                    max_attempts INTEGER,
                    time_limit_secs INTEGER,
                    randomize_order INTEGER NOT NULL CHECK (randomize_order IN (0, 1)),
                    show_answers TEXT NOT NULL,
                    FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS enrollments (
                    id TEXT PRIMARY KEY,
                    learner_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    progress_pct REAL NOT NULL CHECK (progress_pct BETWEEN 0.0 AND 100.0),
                    status TEXT NOT NULL,
                    completed_at TEXT,
                    last_lesson_id TEXT,
                    last_position_secs INTEGER,
                    created_at TEXT NOT NULL,
                    UNIQUE (learner_id, course_id),
                    FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_progress (
                    enrollment_id TEXT NOT NULL,
                    lesson_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    watch_duration_secs INTEGER NOT NULL CHECK (watch_duration_secs >= 0),
                    watched_intervals TEXT NOT NULL,
                    watched_pct REAL NOT NULL,
                    pages_viewed TEXT NOT NULL,
                    pages_pct REAL NOT NULL,
                    quiz_score INTEGER,
                    quiz_attempts INTEGER NOT NULL CHECK (quiz_attempts >= 0),
                    scorm_score INTEGER,
                    completed_at TEXT,
                    PRIMARY KEY (enrollment_id, lesson_id),
                    FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE,
                    FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_attempts (
                    id INTEGER PRIMARY KEY,
                    quiz_id TEXT NOT NULL,
                    enrollment_id TEXT NOT NULL,
                    learner_id TEXT NOT NULL,
                    attempt_number INTEGER NOT NULL CHECK (attempt_number >= 1),
                    answers TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                    passed INTEGER NOT NULL CHECK (passed IN (0, 1)),
                    correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    time_taken_secs INTEGER,
                    submitted_at TEXT NOT NULL,
                    UNIQUE (quiz_id, enrollment_id, attempt_number),
                    FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE,
                    FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS scorm_sessions (
                    id TEXT PRIMARY KEY,
                    enrollment_id TEXT NOT NULL,
                    lesson_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    tracking_data TEXT NOT NULL,
                    score_raw INTEGER,
                    score_max INTEGER,
                    score_min INTEGER,
                    total_time_secs INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE,
                    FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_modules_course_sort
                    ON course_modules (course_id, sort_order);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lessons_course_sort
                    ON lessons (course_id, sort_order);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_progress_enrollment
                    ON lesson_progress (enrollment_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempts_quiz_enrollment
                    ON quiz_attempts (quiz_id, enrollment_id, attempt_number);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_scorm_enrollment_lesson
                    ON scorm_sessions (enrollment_id, lesson_id, status);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
