use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::enums::{QuestionType, ShowAnswersPolicy};
use super::ids::{EnrollmentId, LearnerId, LessonId, QuizId};

/// The correct answer for one question; the variant fixes the question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "question_type")]
pub enum AnswerKey {
    /// MCQ: a single correct option index.
    #[serde(rename = "MCQ")]
    Choice { correct_index: usize },
    /// MSQ: exact set of correct option indices; no partial credit.
    #[serde(rename = "MSQ")]
    MultiChoice { correct_indices: BTreeSet<usize> },
    /// True/false: an MCQ over a two-option set.
    #[serde(rename = "TRUE_FALSE")]
    TrueFalse { correct_index: usize },
    /// Short answer: case-insensitive, whitespace-trimmed exact match.
    #[serde(rename = "SHORT_ANSWER")]
    Text { correct_text: String },
}

impl AnswerKey {
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Choice { .. } => QuestionType::Mcq,
            Self::MultiChoice { .. } => QuestionType::Msq,
            Self::TrueFalse { .. } => QuestionType::TrueFalse,
            Self::Text { .. } => QuestionType::ShortAnswer,
        }
    }
}

/// One question in a quiz's stored bank.
///
/// The bank order is canonical: grading always indexes by this order, no
/// matter what order the questions were shown in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    #[serde(flatten)]
    pub key: AnswerKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A learner's response to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(usize),
    Choices(BTreeSet<usize>),
    Text(String),
}

/// One submitted answer, tagged with the index of the question it answers in
/// the stored bank.
///
/// The tag is required because a started quiz may have shown the questions in
/// shuffled order; positional answer arrays would silently mis-grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_index: usize,
    pub value: AnswerValue,
}

/// Quiz definition attached to a lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    pub quiz_id: QuizId,
    pub lesson_id: LessonId,
    pub questions: Vec<Question>,
    pub passing_score: u32,
    /// `None` means unlimited attempts.
    pub max_attempts: Option<u32>,
    pub time_limit_secs: Option<u32>,
    pub randomize_order: bool,
    pub show_answers: ShowAnswersPolicy,
}

impl Quiz {
    #[must_use]
    pub fn total_questions(&self) -> u32 {
        u32::try_from(self.questions.len()).unwrap_or(u32::MAX)
    }
}

/// Immutable record of one graded quiz attempt.
///
/// Attempt numbers are strictly increasing per (quiz, enrollment); the
/// storage layer serializes their allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizAttempt {
    pub quiz_id: QuizId,
    pub enrollment_id: EnrollmentId,
    pub learner_id: LearnerId,
    pub attempt_number: u32,
    pub answers: Vec<SubmittedAnswer>,
    pub score: u32,
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
    pub time_taken_secs: Option<u32>,
    pub submitted_at: DateTime<Utc>,
}
