//! Weighted completion aggregation.
//!
//! Each lesson contributes a score in `[0, 1]` scaled by its type weight;
//! course progress is the weighted mean over every lesson in the structure,
//! expressed as a percentage. Lessons without a progress row score zero but
//! still count in the denominator, so an untouched lesson always drags the
//! course percentage down.

use std::collections::HashMap;

use crate::model::{CourseStructure, Lesson, LessonId, LessonProgress, LessonType, ModuleId};
use crate::policy::CompletionPolicy;

/// Per-lesson score in `[0, 1]` toward course completion.
///
/// Video and document lessons earn partial credit relative to the policy
/// threshold (95% watched against a 90% threshold is already full credit).
/// Quiz lessons earn credit once the best recorded score meets the policy's
/// `score_threshold`, independent of the quiz's own passing score. Text and
/// SCORM lessons are binary on completion.
#[must_use]
pub fn lesson_score(
    lesson: &Lesson,
    progress: Option<&LessonProgress>,
    policy: &CompletionPolicy,
) -> f64 {
    let Some(progress) = progress else {
        return 0.0;
    };
    match lesson.lesson_type {
        LessonType::Video => ratio(progress.watched_pct(), policy.video_watch_pct),
        LessonType::Pdf => ratio(progress.pages_pct(), policy.doc_read_pct),
        LessonType::Quiz => {
            if quiz_meets_threshold(progress, policy) {
                1.0
            } else {
                0.0
            }
        }
        LessonType::Text | LessonType::Scorm => {
            if progress.is_completed() {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Whether the lesson meets its completion criterion under `policy`.
#[must_use]
pub fn is_lesson_complete(
    lesson: &Lesson,
    progress: &LessonProgress,
    policy: &CompletionPolicy,
) -> bool {
    match lesson.lesson_type {
        LessonType::Video => progress.watched_pct() >= policy.video_watch_pct,
        LessonType::Pdf => progress.pages_pct() >= policy.doc_read_pct,
        LessonType::Quiz => quiz_meets_threshold(progress, policy),
        LessonType::Text | LessonType::Scorm => progress.is_completed(),
    }
}

fn quiz_meets_threshold(progress: &LessonProgress, policy: &CompletionPolicy) -> bool {
    progress
        .quiz_score()
        .is_some_and(|score| score >= policy.score_threshold)
}

/// Weighted progress percentage over an arbitrary set of lessons.
///
/// Returns 0 when the set is empty or every weight is zero.
#[must_use]
pub fn weighted_pct<'a>(
    lessons: impl IntoIterator<Item = &'a Lesson>,
    progress: &HashMap<LessonId, LessonProgress>,
    policy: &CompletionPolicy,
) -> f64 {
    let mut weight_sum = 0.0;
    let mut score_sum = 0.0;
    for lesson in lessons {
        let weight = policy.weights.for_type(lesson.lesson_type);
        weight_sum += weight;
        score_sum += weight * lesson_score(lesson, progress.get(&lesson.lesson_id), policy);
    }
    if weight_sum <= 0.0 {
        return 0.0;
    }
    round2(score_sum / weight_sum * 100.0)
}

/// Course-wide weighted progress percentage, rounded to two decimals.
#[must_use]
pub fn course_progress(
    structure: &CourseStructure,
    progress: &HashMap<LessonId, LessonProgress>,
    policy: &CompletionPolicy,
) -> f64 {
    weighted_pct(structure.lessons(), progress, policy)
}

/// Completed-lesson percentage for one module, rounded to two decimals.
///
/// Module rollups count lesson completions only; partial credit applies to
/// the course-wide weighted percentage, not here. Empty modules report zero.
#[must_use]
pub fn module_completion(
    structure: &CourseStructure,
    module_id: ModuleId,
    progress: &HashMap<LessonId, LessonProgress>,
) -> f64 {
    let mut total = 0u32;
    let mut completed = 0u32;
    for lesson in structure.lessons_in_module(module_id) {
        total += 1;
        if progress
            .get(&lesson.lesson_id)
            .is_some_and(LessonProgress::is_completed)
        {
            completed += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    round2(f64::from(completed) / f64::from(total) * 100.0)
}

fn ratio(achieved_pct: f64, threshold_pct: f64) -> f64 {
    if threshold_pct <= 0.0 {
        // A zero threshold means the criterion is always met.
        return 1.0;
    }
    (achieved_pct / threshold_pct).min(1.0)
}

/// Round to two decimal places, the precision every stored percentage uses.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, CourseModule, EnrollmentId};
    use crate::time::fixed_now;

    fn lesson(course: CourseId, module: ModuleId, lesson_type: LessonType, order: i32) -> Lesson {
        Lesson {
            lesson_id: LessonId::generate(),
            module_id: module,
            course_id: course,
            title: format!("L{order}"),
            lesson_type,
            duration_secs: (lesson_type == LessonType::Video).then_some(100),
            total_pages: (lesson_type == LessonType::Pdf).then_some(10),
            sort_order: order,
            is_preview: false,
        }
    }

    fn video_progress(enrollment: EnrollmentId, lesson: LessonId, pct: f64) -> LessonProgress {
        let mut p = LessonProgress::new(enrollment, lesson);
        p.record_watched(Vec::new(), 0, pct);
        p
    }

    #[test]
    fn partial_watch_earns_partial_credit_capped_at_full() {
        let course = CourseId::generate();
        let module = ModuleId::generate();
        let policy = CompletionPolicy::default();
        let l = lesson(course, module, LessonType::Video, 0);
        let e = EnrollmentId::generate();

        let half = video_progress(e, l.lesson_id, 45.0);
        assert_eq!(lesson_score(&l, Some(&half), &policy), 0.5);

        // 95% watched against a 90% threshold: full credit, never above 1.
        let over = video_progress(e, l.lesson_id, 95.0);
        assert_eq!(lesson_score(&l, Some(&over), &policy), 1.0);
    }

    #[test]
    fn missing_progress_counts_in_denominator() {
        let course = CourseId::generate();
        let module = ModuleId::generate();
        let policy = CompletionPolicy::default();
        let video = lesson(course, module, LessonType::Video, 0);
        let quiz = lesson(course, module, LessonType::Quiz, 1);
        let structure = CourseStructure::new(
            course,
            vec![CourseModule {
                module_id: module,
                course_id: course,
                title: "M".into(),
                sort_order: 0,
            }],
            vec![video.clone(), quiz],
        );

        let e = EnrollmentId::generate();
        let mut map = HashMap::new();
        map.insert(video.lesson_id, video_progress(e, video.lesson_id, 95.0));

        // Video full, quiz untouched: (1.0 + 0.0) / 2.
        assert_eq!(course_progress(&structure, &map, &policy), 50.0);
    }

    #[test]
    fn zero_weight_excludes_a_lesson_type() {
        let course = CourseId::generate();
        let module = ModuleId::generate();
        let mut policy = CompletionPolicy::default();
        policy.weights.quiz = 0.0;

        let video = lesson(course, module, LessonType::Video, 0);
        let quiz = lesson(course, module, LessonType::Quiz, 1);
        let structure = CourseStructure::new(course, Vec::new(), vec![video.clone(), quiz]);

        let e = EnrollmentId::generate();
        let mut map = HashMap::new();
        map.insert(video.lesson_id, video_progress(e, video.lesson_id, 90.0));

        assert_eq!(course_progress(&structure, &map, &policy), 100.0);
    }

    #[test]
    fn empty_course_reports_zero() {
        let course = CourseId::generate();
        let structure = CourseStructure::new(course, Vec::new(), Vec::new());
        let policy = CompletionPolicy::default();
        assert_eq!(course_progress(&structure, &HashMap::new(), &policy), 0.0);
    }

    #[test]
    fn completed_text_lesson_is_binary() {
        let course = CourseId::generate();
        let module = ModuleId::generate();
        let policy = CompletionPolicy::default();
        let l = lesson(course, module, LessonType::Text, 0);
        let e = EnrollmentId::generate();

        let mut p = LessonProgress::new(e, l.lesson_id);
        assert_eq!(lesson_score(&l, Some(&p), &policy), 0.0);
        p.mark_completed(fixed_now());
        assert_eq!(lesson_score(&l, Some(&p), &policy), 1.0);
        assert!(is_lesson_complete(&l, &p, &policy));
    }

    #[test]
    fn quiz_credit_follows_policy_threshold_not_quiz_passing_score() {
        let course = CourseId::generate();
        let module = ModuleId::generate();
        let policy = CompletionPolicy::default();
        let l = lesson(course, module, LessonType::Quiz, 0);
        let e = EnrollmentId::generate();

        // A 75 best score clears the default 70 threshold even though the
        // attempt never passed the quiz and the lesson stays in progress.
        let mut p = LessonProgress::new(e, l.lesson_id);
        p.record_quiz_attempt(75, 1);
        assert!(!p.is_completed());
        assert_eq!(lesson_score(&l, Some(&p), &policy), 1.0);
        assert!(is_lesson_complete(&l, &p, &policy));

        let mut low = LessonProgress::new(e, l.lesson_id);
        low.record_quiz_attempt(60, 1);
        assert_eq!(lesson_score(&l, Some(&low), &policy), 0.0);
        assert!(!is_lesson_complete(&l, &low, &policy));
    }

    #[test]
    fn module_completion_counts_completed_lessons_only() {
        let course = CourseId::generate();
        let m1 = ModuleId::generate();
        let m2 = ModuleId::generate();
        let a = lesson(course, m1, LessonType::Video, 0);
        let b = lesson(course, m1, LessonType::Text, 1);
        let c = lesson(course, m2, LessonType::Video, 2);
        let structure = CourseStructure::new(course, Vec::new(), vec![a.clone(), b, c.clone()]);

        let e = EnrollmentId::generate();
        let mut map = HashMap::new();
        let mut done = video_progress(e, a.lesson_id, 95.0);
        done.mark_completed(fixed_now());
        map.insert(a.lesson_id, done);
        // Half-watched: counts toward the weighted course pct, not the module
        // rollup.
        map.insert(c.lesson_id, video_progress(e, c.lesson_id, 45.0));

        assert_eq!(module_completion(&structure, m1, &map), 50.0);
        assert_eq!(module_completion(&structure, m2, &map), 0.0);
    }
}
