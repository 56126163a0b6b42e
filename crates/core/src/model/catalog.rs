//! Read-only catalog snapshot types.
//!
//! Course, module, and lesson definitions are owned by the catalog service;
//! the engine consumes a denormalized snapshot loaded once per aggregation
//! pass so the course → module → lesson hierarchy is never re-fetched per
//! lesson.

use serde::{Deserialize, Serialize};

use super::enums::LessonType;
use super::ids::{CourseId, LessonId, ModuleId};

/// One lesson as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_id: LessonId,
    pub module_id: ModuleId,
    pub course_id: CourseId,
    pub title: String,
    pub lesson_type: LessonType,
    /// Video length in seconds; `None` for non-video lessons.
    pub duration_secs: Option<u32>,
    /// Page count for document lessons.
    pub total_pages: Option<u32>,
    pub sort_order: i32,
    /// Preview lessons are reachable without an enrollment.
    pub is_preview: bool,
}

/// One module within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    pub module_id: ModuleId,
    pub course_id: CourseId,
    pub title: String,
    pub sort_order: i32,
}

/// Flat snapshot of a course's module/lesson hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseStructure {
    course_id: CourseId,
    modules: Vec<CourseModule>,
    lessons: Vec<Lesson>,
}

impl CourseStructure {
    /// Build a snapshot, sorting modules and lessons by their sort order.
    #[must_use]
    pub fn new(course_id: CourseId, mut modules: Vec<CourseModule>, mut lessons: Vec<Lesson>) -> Self {
        modules.sort_by_key(|m| m.sort_order);
        lessons.sort_by_key(|l| l.sort_order);
        Self {
            course_id,
            modules,
            lessons,
        }
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// Modules in display order.
    #[must_use]
    pub fn modules(&self) -> &[CourseModule] {
        &self.modules
    }

    /// Every lesson in the course, in sort order.
    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    /// Lessons belonging to one module, in sort order.
    pub fn lessons_in_module(&self, module_id: ModuleId) -> impl Iterator<Item = &Lesson> {
        self.lessons.iter().filter(move |l| l.module_id == module_id)
    }

    #[must_use]
    pub fn find_lesson(&self, lesson_id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_id == lesson_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}
