//! Domain model: identifiers, catalog snapshots, enrollments, per-lesson
//! progress, quizzes, and SCORM sessions.

pub mod catalog;
pub mod enrollment;
pub mod enums;
pub mod ids;
pub mod progress;
pub mod quiz;
pub mod scorm;

pub use catalog::{CourseModule, CourseStructure, Lesson};
pub use enrollment::{Enrollment, EnrollmentError};
pub use enums::{
    EnrollmentStatus, LessonProgressStatus, LessonType, QuestionType, ScormSessionStatus,
    ShowAnswersPolicy, UnknownVariant,
};
pub use ids::{
    CourseId, EnrollmentId, LearnerId, LessonId, ModuleId, ParseIdError, QuizId, SessionId,
};
pub use progress::LessonProgress;
pub use quiz::{AnswerKey, AnswerValue, Question, Quiz, QuizAttempt, SubmittedAnswer};
pub use scorm::{ScormCommit, ScormSession, ScormSessionError};
