use progress_core::model::{
    CourseId, CourseModule, CourseStructure, Lesson, LessonId, Quiz, QuizId,
};

use super::{
    SqliteRepository,
    mapping::{map_course_row, map_lesson_row, map_module_row, map_quiz_row, to_json},
};
use crate::repository::{CatalogRepository, CourseRecord, StorageError};

fn conn_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, title, requires_approval, completion_logic)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                requires_approval = excluded.requires_approval,
                completion_logic = excluded.completion_logic
            ",
        )
        .bind(course.course_id.value().to_string())
        .bind(course.title.as_str())
        .bind(course.requires_approval)
        .bind(to_json(&course.completion_logic)?)
        .execute(&self.pool)
        .await
        .map_err(conn_err)?;

        Ok(())
    }

    async fn upsert_module(&self, module: &CourseModule) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO course_modules (id, course_id, title, sort_order)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                sort_order = excluded.sort_order
            ",
        )
        .bind(module.module_id.value().to_string())
        .bind(module.course_id.value().to_string())
        .bind(module.title.as_str())
        .bind(i64::from(module.sort_order))
        .execute(&self.pool)
        .await
        .map_err(conn_err)?;

        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (
                id, module_id, course_id, title, lesson_type, duration_secs,
                total_pages, sort_order, is_preview
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                lesson_type = excluded.lesson_type,
                duration_secs = excluded.duration_secs,
                total_pages = excluded.total_pages,
                sort_order = excluded.sort_order,
                is_preview = excluded.is_preview
            ",
        )
        .bind(lesson.lesson_id.value().to_string())
        .bind(lesson.module_id.value().to_string())
        .bind(lesson.course_id.value().to_string())
        .bind(lesson.title.as_str())
        .bind(lesson.lesson_type.as_str())
        .bind(lesson.duration_secs.map(i64::from))
        .bind(lesson.total_pages.map(i64::from))
        .bind(i64::from(lesson.sort_order))
        .bind(lesson.is_preview)
        .execute(&self.pool)
        .await
        .map_err(conn_err)?;

        Ok(())
    }

    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO quizzes (
                id, lesson_id, questions, passing_score, max_attempts,
                time_limit_secs, randomize_order, show_answers
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                questions = excluded.questions,
                passing_score = excluded.passing_score,
                max_attempts = excluded.max_attempts,
                time_limit_secs = excluded.time_limit_secs,
                randomize_order = excluded.randomize_order,
                show_answers = excluded.show_answers
            ",
        )
        .bind(quiz.quiz_id.value().to_string())
        .bind(quiz.lesson_id.value().to_string())
        .bind(to_json(&quiz.questions)?)
        .bind(i64::from(quiz.passing_score))
        .bind(quiz.max_attempts.map(i64::from))
        .bind(quiz.time_limit_secs.map(i64::from))
        .bind(quiz.randomize_order)
        .bind(quiz.show_answers.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn_err)?;

        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<CourseRecord, StorageError> {
        let row = sqlx::query(
            "SELECT id, title, requires_approval, completion_logic FROM courses WHERE id = ?1",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        match row {
            Some(row) => map_course_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn course_structure(&self, id: CourseId) -> Result<CourseStructure, StorageError> {
        // Existence check first so an unknown course is NotFound rather than
        // an empty structure.
        self.get_course(id).await?;

        let module_rows = sqlx::query(
            "SELECT id, course_id, title, sort_order FROM course_modules WHERE course_id = ?1",
        )
        .bind(id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let lesson_rows = sqlx::query(
            r"
            SELECT id, module_id, course_id, title, lesson_type, duration_secs,
                   total_pages, sort_order, is_preview
            FROM lessons
            WHERE course_id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let mut modules = Vec::with_capacity(module_rows.len());
        for row in module_rows {
            modules.push(map_module_row(&row)?);
        }
        let mut lessons = Vec::with_capacity(lesson_rows.len());
        for row in lesson_rows {
            lessons.push(map_lesson_row(&row)?);
        }
        Ok(CourseStructure::new(id, modules, lessons))
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, module_id, course_id, title, lesson_type, duration_secs,
                   total_pages, sort_order, is_preview
            FROM lessons
            WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        match row {
            Some(row) => map_lesson_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, lesson_id, questions, passing_score, max_attempts,
                   time_limit_secs, randomize_order, show_answers
            FROM quizzes
            WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        match row {
            Some(row) => map_quiz_row(&row),
            None => Err(StorageError::NotFound),
        }
    }
}
