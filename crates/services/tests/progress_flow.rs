use std::sync::Arc;

use chrono::Duration;
use progress_core::Clock;
use progress_core::intervals::Interval;
use progress_core::model::{
    AnswerKey, AnswerValue, CourseId, CourseModule, EnrollmentStatus, LearnerId, Lesson, LessonId,
    LessonProgressStatus, LessonType, ModuleId, Question, Quiz, QuizId, ScormCommit,
    ShowAnswersPolicy, SubmittedAnswer,
};
use progress_core::time::{fixed_clock, fixed_now};
use progress_services::assessment::AssessmentService;
use progress_services::enrollment::EnrollmentService;
use progress_services::error::ProgressError;
use progress_services::playback::PlaybackService;
use progress_services::scorm::ScormService;
use progress_storage::cache::{InMemoryCache, ResumeCache, UnavailableCache};
use progress_storage::repository::{CourseRecord, Storage};
use serde_json::json;

struct Fixture {
    storage: Storage,
    cache: Arc<dyn ResumeCache>,
    course_id: CourseId,
    module_id: ModuleId,
}

impl Fixture {
    async fn new() -> Self {
        let storage = Storage::in_memory();
        let course_id = CourseId::generate();
        let module_id = ModuleId::generate();
        storage
            .catalog
            .upsert_course(&CourseRecord {
                course_id,
                title: "Async Rust".into(),
                requires_approval: false,
                completion_logic: json!({}),
            })
            .await
            .unwrap();
        storage
            .catalog
            .upsert_module(&CourseModule {
                module_id,
                course_id,
                title: "Module 1".into(),
                sort_order: 0,
            })
            .await
            .unwrap();
        Self {
            storage,
            cache: Arc::new(InMemoryCache::new()),
            course_id,
            module_id,
        }
    }

    async fn add_lesson(&self, lesson_type: LessonType, sort_order: i32) -> Lesson {
        let lesson = Lesson {
            lesson_id: LessonId::generate(),
            module_id: self.module_id,
            course_id: self.course_id,
            title: format!("Lesson {sort_order}"),
            lesson_type,
            duration_secs: (lesson_type == LessonType::Video).then_some(100),
            total_pages: (lesson_type == LessonType::Pdf).then_some(10),
            sort_order,
            is_preview: false,
        };
        self.storage.catalog.upsert_lesson(&lesson).await.unwrap();
        lesson
    }

    async fn add_quiz(&self, lesson_id: LessonId, max_attempts: Option<u32>) -> Quiz {
        let quiz = Quiz {
            quiz_id: QuizId::generate(),
            lesson_id,
            questions: vec![Question {
                question: "2 + 2?".into(),
                options: vec!["3".into(), "4".into(), "5".into()],
                key: AnswerKey::Choice { correct_index: 1 },
                explanation: None,
            }],
            passing_score: 70,
            max_attempts,
            time_limit_secs: Some(60),
            randomize_order: false,
            show_answers: ShowAnswersPolicy::AfterSubmit,
        };
        self.storage.catalog.upsert_quiz(&quiz).await.unwrap();
        quiz
    }

    fn playback(&self, clock: Clock) -> PlaybackService {
        PlaybackService::new(clock, self.storage.clone(), self.cache.clone())
    }

    fn assessment(&self, clock: Clock) -> AssessmentService {
        AssessmentService::new(clock, self.storage.clone(), self.cache.clone())
    }

    fn enrollments(&self) -> EnrollmentService {
        EnrollmentService::new(fixed_clock(), self.storage.clone())
    }
}

fn answer(index: usize, choice: usize) -> SubmittedAnswer {
    SubmittedAnswer {
        question_index: index,
        value: AnswerValue::Choice(choice),
    }
}

#[tokio::test]
async fn video_and_quiz_complete_the_course() {
    let f = Fixture::new().await;
    let video = f.add_lesson(LessonType::Video, 0).await;
    let quiz_lesson = f.add_lesson(LessonType::Quiz, 1).await;
    let quiz = f.add_quiz(quiz_lesson.lesson_id, Some(3)).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let playback = f.playback(fixed_clock());
    let assessment = f.assessment(fixed_clock());

    // 95 of 100 seconds watched clears the 90% threshold.
    let beat = playback
        .record_video_heartbeat(
            enrollment.enrollment_id(),
            video.lesson_id,
            &[Interval::new(0, 95)],
            95,
        )
        .await
        .unwrap();
    assert_eq!(beat.watched_pct, 95.0);
    assert!(beat.lesson_completed);
    assert_eq!(beat.course_progress_pct, 50.0);

    let started = assessment
        .start_quiz(enrollment.enrollment_id(), quiz.quiz_id)
        .await
        .unwrap();
    assert_eq!(started.attempt_number, 1);
    assert_eq!(started.questions.len(), 1);
    assert_eq!(started.questions[0].question_index, 0);
    assert!(started.questions[0].options.len() == 3);

    let outcome = assessment
        .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 1)])
        .await
        .unwrap();
    assert!(outcome.attempt.passed);
    assert_eq!(outcome.attempt.score, 100);
    assert!(outcome.lesson_completed);
    assert_eq!(outcome.course_progress_pct, 100.0);
    assert!(outcome.review.is_some());

    let report = f
        .enrollments()
        .detailed_course_progress(enrollment.enrollment_id())
        .await
        .unwrap();
    assert_eq!(report.status, EnrollmentStatus::Completed);
    assert_eq!(report.progress_pct, 100.0);
    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.modules[0].progress_pct, 100.0);
    assert_eq!(report.last_lesson_id, Some(video.lesson_id));
}

#[tokio::test]
async fn heartbeat_after_completion_never_regresses() {
    let f = Fixture::new().await;
    let video = f.add_lesson(LessonType::Video, 0).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let playback = f.playback(fixed_clock());

    let first = playback
        .record_video_heartbeat(
            enrollment.enrollment_id(),
            video.lesson_id,
            &[Interval::new(0, 95)],
            95,
        )
        .await
        .unwrap();
    assert!(first.lesson_completed);
    assert_eq!(first.course_progress_pct, 100.0);

    // A stale retry of an early batch arrives after completion.
    let replay = playback
        .record_video_heartbeat(
            enrollment.enrollment_id(),
            video.lesson_id,
            &[Interval::new(0, 10)],
            10,
        )
        .await
        .unwrap();
    assert!(replay.lesson_completed);
    assert_eq!(replay.watch_duration_secs, 95);
    assert_eq!(replay.course_progress_pct, 100.0);
}

#[tokio::test]
async fn pdf_pages_accumulate_without_double_counting() {
    let f = Fixture::new().await;
    let pdf = f.add_lesson(LessonType::Pdf, 0).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let playback = f.playback(fixed_clock());

    let beat = playback
        .record_document_heartbeat(
            enrollment.enrollment_id(),
            pdf.lesson_id,
            &[1, 2, 3, 4, 5],
        )
        .await
        .unwrap();
    assert_eq!(beat.pages_pct, 50.0);
    assert!(!beat.lesson_completed);

    // Repeats, an out-of-range page, and four new pages: 9 of 10 unique.
    let beat = playback
        .record_document_heartbeat(
            enrollment.enrollment_id(),
            pdf.lesson_id,
            &[4, 5, 6, 7, 8, 9, 42],
        )
        .await
        .unwrap();
    assert_eq!(beat.pages_pct, 90.0);
    assert!(beat.lesson_completed);
}

#[tokio::test]
async fn quiz_attempt_limit_is_enforced() {
    let f = Fixture::new().await;
    let quiz_lesson = f.add_lesson(LessonType::Quiz, 0).await;
    let quiz = f.add_quiz(quiz_lesson.lesson_id, Some(1)).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let assessment = f.assessment(fixed_clock());

    let outcome = assessment
        .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 0)])
        .await
        .unwrap();
    assert!(!outcome.attempt.passed);
    assert_eq!(outcome.attempt.attempt_number, 1);

    assert!(matches!(
        assessment
            .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 1)])
            .await,
        Err(ProgressError::MaxAttemptsReached { limit: 1 })
    ));
    assert!(matches!(
        assessment
            .start_quiz(enrollment.enrollment_id(), quiz.quiz_id)
            .await,
        Err(ProgressError::MaxAttemptsReached { limit: 1 })
    ));
}

#[tokio::test]
async fn failed_attempts_keep_best_score_and_count() {
    let f = Fixture::new().await;
    let quiz_lesson = f.add_lesson(LessonType::Quiz, 0).await;
    let quiz = f.add_quiz(quiz_lesson.lesson_id, Some(5)).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let assessment = f.assessment(fixed_clock());

    assessment
        .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 1)])
        .await
        .unwrap();
    let second = assessment
        .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 0)])
        .await
        .unwrap();
    assert_eq!(second.attempt.attempt_number, 2);
    // The passing first attempt already completed the lesson; a later failed
    // attempt does not undo that.
    assert!(second.lesson_completed);
    assert_eq!(second.course_progress_pct, 100.0);

    let history = assessment
        .attempt_history(enrollment.enrollment_id(), quiz.quiz_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].score, 100);
    assert_eq!(history[1].score, 0);
}

#[tokio::test]
async fn quiz_timer_rejects_late_submissions_but_allows_grace() {
    let f = Fixture::new().await;
    let quiz_lesson = f.add_lesson(LessonType::Quiz, 0).await;
    let quiz = f.add_quiz(quiz_lesson.lesson_id, None).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();

    let start = fixed_now();
    f.assessment(Clock::fixed(start))
        .start_quiz(enrollment.enrollment_id(), quiz.quiz_id)
        .await
        .unwrap();

    // 85s elapsed against a 60s limit: inside the 30s grace.
    let within_grace = f
        .assessment(Clock::fixed(start + Duration::seconds(85)))
        .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 1)])
        .await
        .unwrap();
    assert_eq!(within_grace.attempt.time_taken_secs, Some(85));

    // Re-arm the timer, then submit past limit + grace.
    f.assessment(Clock::fixed(start))
        .start_quiz(enrollment.enrollment_id(), quiz.quiz_id)
        .await
        .unwrap();
    assert!(matches!(
        f.assessment(Clock::fixed(start + Duration::seconds(91)))
            .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 1)])
            .await,
        Err(ProgressError::QuizTimeLimitExceeded { limit_secs: 60 })
    ));
}

#[tokio::test]
async fn degraded_cache_never_blocks_progress() {
    let f = Fixture::new().await;
    let video = f.add_lesson(LessonType::Video, 0).await;
    let quiz_lesson = f.add_lesson(LessonType::Quiz, 1).await;
    let quiz = f.add_quiz(quiz_lesson.lesson_id, None).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();

    let playback = PlaybackService::new(fixed_clock(), f.storage.clone(), Arc::new(UnavailableCache));
    let beat = playback
        .record_video_heartbeat(
            enrollment.enrollment_id(),
            video.lesson_id,
            &[Interval::new(0, 40)],
            40,
        )
        .await
        .unwrap();
    assert_eq!(beat.watched_pct, 40.0);

    // The cache is down, so resume falls back to the stored enrollment.
    let resume = playback
        .resume_position(enrollment.enrollment_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resume.lesson_id, video.lesson_id);
    assert_eq!(resume.position_secs, 40);

    // Start and submit also survive: no timer marker means no limit check.
    let assessment =
        AssessmentService::new(fixed_clock(), f.storage.clone(), Arc::new(UnavailableCache));
    assessment
        .start_quiz(enrollment.enrollment_id(), quiz.quiz_id)
        .await
        .unwrap();
    let outcome = assessment
        .submit_attempt(enrollment.enrollment_id(), quiz.quiz_id, vec![answer(0, 1)])
        .await
        .unwrap();
    assert!(outcome.attempt.passed);
    assert_eq!(outcome.attempt.time_taken_secs, None);
}

#[tokio::test]
async fn scorm_session_drives_lesson_completion() {
    let f = Fixture::new().await;
    let scorm_lesson = f.add_lesson(LessonType::Scorm, 0).await;

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let scorm = ScormService::new(fixed_clock(), f.storage.clone());

    let session = scorm
        .open_session(enrollment.enrollment_id(), scorm_lesson.lesson_id)
        .await
        .unwrap();

    // Re-opening resumes the same session.
    let reopened = scorm
        .open_session(enrollment.enrollment_id(), scorm_lesson.lesson_id)
        .await
        .unwrap();
    assert_eq!(reopened.session_id(), session.session_id());

    let outcome = scorm
        .commit(
            session.session_id(),
            ScormCommit {
                tracking_data: [("cmi.location".to_owned(), json!("slide-2"))].into(),
                score_raw: Some(88),
                completion_status: Some("completed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.lesson_completed);
    assert_eq!(outcome.course_progress_pct, 100.0);

    // The finished session refuses replayed commits.
    assert!(matches!(
        scorm.commit(session.session_id(), ScormCommit::default()).await,
        Err(ProgressError::SessionAlreadyCompleted)
    ));
}

#[tokio::test]
async fn quiz_credit_follows_policy_threshold_not_quiz_passing_score() {
    let f = Fixture::new().await;
    let quiz_lesson = f.add_lesson(LessonType::Quiz, 0).await;

    // Four questions at a 90 passing score: 3 of 4 correct scores 75, which
    // fails the quiz but clears the policy's default 70 credit threshold.
    let quiz = Quiz {
        quiz_id: QuizId::generate(),
        lesson_id: quiz_lesson.lesson_id,
        questions: (0..4)
            .map(|i| Question {
                question: format!("Q{i}"),
                options: vec!["a".into(), "b".into()],
                key: AnswerKey::Choice { correct_index: 1 },
                explanation: None,
            })
            .collect(),
        passing_score: 90,
        max_attempts: None,
        time_limit_secs: None,
        randomize_order: false,
        show_answers: ShowAnswersPolicy::AfterSubmit,
    };
    f.storage.catalog.upsert_quiz(&quiz).await.unwrap();

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let outcome = f
        .assessment(fixed_clock())
        .submit_attempt(
            enrollment.enrollment_id(),
            quiz.quiz_id,
            vec![answer(0, 1), answer(1, 1), answer(2, 1), answer(3, 0)],
        )
        .await
        .unwrap();
    assert_eq!(outcome.attempt.score, 75);
    assert!(!outcome.attempt.passed);
    assert!(!outcome.lesson_completed);
    assert_eq!(outcome.course_progress_pct, 100.0);

    // The course completes on credit, while the lesson row and the module
    // rollup keep reporting the unfinished quiz.
    let report = f
        .enrollments()
        .detailed_course_progress(enrollment.enrollment_id())
        .await
        .unwrap();
    assert_eq!(report.status, EnrollmentStatus::Completed);
    assert_eq!(report.progress_pct, 100.0);
    assert_eq!(report.modules[0].progress_pct, 0.0);
    assert_eq!(
        report.modules[0].lessons[0].status,
        LessonProgressStatus::InProgress
    );
    assert_eq!(report.modules[0].lessons[0].quiz_score, Some(75));
}

#[tokio::test]
async fn report_rounds_percentages_and_counts_module_completions() {
    let f = Fixture::new().await;
    let text = f.add_lesson(LessonType::Text, 0).await;
    let pdf = Lesson {
        lesson_id: LessonId::generate(),
        module_id: f.module_id,
        course_id: f.course_id,
        title: "Workbook".into(),
        lesson_type: LessonType::Pdf,
        duration_secs: None,
        total_pages: Some(3),
        sort_order: 1,
        is_preview: false,
    };
    f.storage.catalog.upsert_lesson(&pdf).await.unwrap();
    let video = Lesson {
        lesson_id: LessonId::generate(),
        module_id: f.module_id,
        course_id: f.course_id,
        title: "Deep dive".into(),
        lesson_type: LessonType::Video,
        duration_secs: Some(600),
        total_pages: None,
        sort_order: 2,
        is_preview: false,
    };
    f.storage.catalog.upsert_lesson(&video).await.unwrap();

    let enrollment = f
        .enrollments()
        .enroll(LearnerId::generate(), f.course_id)
        .await
        .unwrap();
    let playback = f.playback(fixed_clock());

    let beat = playback
        .record_document_heartbeat(enrollment.enrollment_id(), text.lesson_id, &[])
        .await
        .unwrap();
    assert!(beat.lesson_completed);

    let beat = playback
        .record_document_heartbeat(enrollment.enrollment_id(), pdf.lesson_id, &[1])
        .await
        .unwrap();
    assert_eq!(beat.pages_pct, 33.33);

    // 155 of 600 seconds watched: stored as 25.83, not 25.8333...
    let beat = playback
        .record_video_heartbeat(
            enrollment.enrollment_id(),
            video.lesson_id,
            &[Interval::new(0, 95), Interval::new(120, 180)],
            180,
        )
        .await
        .unwrap();
    assert_eq!(beat.watched_pct, 25.83);

    // One completed lesson of three: the module rollup ignores the partial
    // document and video credit.
    let report = f
        .enrollments()
        .detailed_course_progress(enrollment.enrollment_id())
        .await
        .unwrap();
    assert_eq!(report.modules[0].progress_pct, 33.33);
    assert_eq!(report.modules[0].lessons[1].pages_pct, 33.33);
    assert_eq!(report.modules[0].lessons[2].watched_pct, 25.83);
}

#[tokio::test]
async fn inactive_enrollments_are_rejected_and_previews_stay_open() {
    let f = Fixture::new().await;
    let video = f.add_lesson(LessonType::Video, 0).await;

    let mut preview = f.add_lesson(LessonType::Video, 1).await;
    preview.is_preview = true;
    f.storage.catalog.upsert_lesson(&preview).await.unwrap();

    let learner = LearnerId::generate();
    let enrollment = f.enrollments().enroll(learner, f.course_id).await.unwrap();
    f.enrollments()
        .drop_out(enrollment.enrollment_id())
        .await
        .unwrap();

    let playback = f.playback(fixed_clock());
    assert!(matches!(
        playback
            .record_video_heartbeat(
                enrollment.enrollment_id(),
                video.lesson_id,
                &[Interval::new(0, 10)],
                10,
            )
            .await,
        Err(ProgressError::NotEnrolled)
    ));

    // Dropped learners lose regular content but keep previews.
    assert!(matches!(
        f.enrollments().lesson_access(learner, video.lesson_id).await,
        Err(ProgressError::ContentNotAccessible)
    ));
    assert!(f.enrollments().lesson_access(learner, preview.lesson_id).await.is_ok());
}
