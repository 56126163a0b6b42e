//! Quiz grading and answer review.
//!
//! Answers are matched to questions by stored-bank index, so submissions made
//! against a shuffled presentation still grade correctly. Unanswered questions
//! and answers pointing at unknown indices simply count as wrong; grading
//! never fails on malformed input.

use std::collections::{BTreeSet, HashMap};

use crate::model::{AnswerKey, AnswerValue, Quiz, ShowAnswersPolicy, SubmittedAnswer};

/// The outcome of grading one submission against a quiz's answer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedAttempt {
    /// Percentage score, 0-100, rounded to the nearest integer.
    pub score: u32,
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
}

/// Post-submission feedback for one question, filtered by the quiz's
/// show-answers policy.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionReview {
    pub question_index: usize,
    pub correct: bool,
    pub correct_answer: AnswerKey,
    pub explanation: Option<String>,
}

/// Grade a submission against the quiz's stored question bank.
///
/// Each question is graded against the last submitted answer carrying its
/// index. An empty quiz grades to zero and passes only under a zero passing
/// score.
#[must_use]
pub fn grade(quiz: &Quiz, answers: &[SubmittedAnswer]) -> GradedAttempt {
    let by_index = index_answers(answers);
    let total_questions = quiz.total_questions();
    let correct_count = quiz
        .questions
        .iter()
        .enumerate()
        .filter(|(i, q)| by_index.get(i).is_some_and(|a| is_correct(&q.key, a)))
        .count();
    let correct_count = u32::try_from(correct_count).unwrap_or(u32::MAX);

    let score = if total_questions == 0 {
        0
    } else {
        (f64::from(correct_count) / f64::from(total_questions) * 100.0).round() as u32
    };
    GradedAttempt {
        score,
        passed: score >= quiz.passing_score,
        correct_count,
        total_questions,
    }
}

/// Build per-question feedback for a graded submission.
///
/// Returns `None` when the policy withholds answers: always for `Never`, and
/// for `AfterPass` until the attempt passes.
#[must_use]
pub fn review(quiz: &Quiz, answers: &[SubmittedAnswer], passed: bool) -> Option<Vec<QuestionReview>> {
    match quiz.show_answers {
        ShowAnswersPolicy::Never => return None,
        ShowAnswersPolicy::AfterPass if !passed => return None,
        ShowAnswersPolicy::AfterSubmit | ShowAnswersPolicy::AfterPass => {}
    }

    let by_index = index_answers(answers);
    Some(
        quiz.questions
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionReview {
                question_index: i,
                correct: by_index.get(&i).is_some_and(|a| is_correct(&q.key, a)),
                correct_answer: q.key.clone(),
                explanation: q.explanation.clone(),
            })
            .collect(),
    )
}

fn index_answers(answers: &[SubmittedAnswer]) -> HashMap<usize, &AnswerValue> {
    answers
        .iter()
        .map(|a| (a.question_index, &a.value))
        .collect()
}

fn is_correct(key: &AnswerKey, answer: &AnswerValue) -> bool {
    match key {
        // A single-choice question also accepts a one-element set.
        AnswerKey::Choice { correct_index } | AnswerKey::TrueFalse { correct_index } => {
            match answer {
                AnswerValue::Choice(chosen) => chosen == correct_index,
                AnswerValue::Choices(chosen) => {
                    chosen.len() == 1 && chosen.contains(correct_index)
                }
                AnswerValue::Text(_) => false,
            }
        }
        // Exact set equality; no partial credit for subsets or supersets.
        AnswerKey::MultiChoice { correct_indices } => match answer {
            AnswerValue::Choices(chosen) => chosen == correct_indices,
            AnswerValue::Choice(chosen) => {
                correct_indices.len() == 1 && correct_indices.contains(chosen)
            }
            AnswerValue::Text(_) => false,
        },
        AnswerKey::Text { correct_text } => match answer {
            AnswerValue::Text(text) => {
                text.trim().to_lowercase() == correct_text.trim().to_lowercase()
            }
            _ => false,
        },
    }
}
