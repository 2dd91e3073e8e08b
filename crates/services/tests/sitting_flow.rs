use quiz_core::model::{
    AnswerDraft, AnswerMark, Guess, OpenAnswerType, Permissions, QuestionDraft, QuestionKind,
    QuestionKindDraft, QuizDraft, QuizId, SittingError, SittingId, SittingMode, User,
};
use quiz_core::time::fixed_now;
use services::{
    AnswerOutcome, AppServices, Clock, MarkingServiceError, SittingServiceError, StartOutcome,
};
use storage::repository::{SittingFilter, StorageError};

struct Fixture {
    app: AppServices,
    student: User,
    quiz: QuizId,
    slug: String,
}

async fn fixture(configure: impl FnOnce(&mut QuizDraft)) -> Fixture {
    let app = AppServices::in_memory(Clock::Fixed(fixed_now()));
    let student = app
        .users()
        .register("student@example.com", "password1", "Stu")
        .await
        .unwrap();
    let category = app
        .categories()
        .create_category("Geography", "")
        .await
        .unwrap();

    let mut draft = QuizDraft {
        title: "Rivers".into(),
        url: "rivers".into(),
        category_id: Some(category.id()),
        pass_mark: 50,
        success_text: "well done".into(),
        fail_text: "try again".into(),
        ..QuizDraft::default()
    };
    configure(&mut draft);
    let quiz = app.quizzes().create_quiz(draft).await.unwrap();

    let questions = app.questions();
    questions
        .create_question(QuestionDraft {
            content: "Longest river?".into(),
            explanation: "The Nile is about 6650 km long.".into(),
            category_id: Some(category.id()),
            sub_category_id: None,
            figure: None,
            quiz_ids: vec![quiz.id()],
            kind: QuestionKindDraft::MultipleChoice {
                answer_order: None,
                allow_multiple_answers: false,
                answers: vec![
                    AnswerDraft {
                        id: None,
                        content: "Nile".into(),
                        correct: true,
                    },
                    AnswerDraft {
                        id: None,
                        content: "Thames".into(),
                        correct: false,
                    },
                ],
            },
        })
        .await
        .unwrap();
    questions
        .create_question(QuestionDraft {
            content: "The Danube flows into the Black Sea.".into(),
            explanation: String::new(),
            category_id: Some(category.id()),
            sub_category_id: None,
            figure: None,
            quiz_ids: vec![quiz.id()],
            kind: QuestionKindDraft::TrueFalse { correct: true },
        })
        .await
        .unwrap();
    questions
        .create_question(QuestionDraft {
            content: "How many rivers cross Paris?".into(),
            explanation: String::new(),
            category_id: None,
            sub_category_id: None,
            figure: None,
            quiz_ids: vec![quiz.id()],
            kind: QuestionKindDraft::Open {
                answer: "2".into(),
                answer_type: OpenAnswerType::Number,
            },
        })
        .await
        .unwrap();

    Fixture {
        app,
        student,
        quiz: quiz.id(),
        slug: quiz.slug().to_string(),
    }
}

async fn start(f: &Fixture, mode: SittingMode) -> SittingId {
    match f
        .app
        .sittings()
        .start(&f.student, &f.slug, mode)
        .await
        .unwrap()
    {
        StartOutcome::Started {
            sitting_id,
            first_order,
        } => {
            assert_eq!(first_order, 1);
            sitting_id
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

async fn correct_choice(f: &Fixture, sitting: SittingId) -> Guess {
    let view = f
        .app
        .sittings()
        .question_view(&f.student, sitting, 1)
        .await
        .unwrap();
    let question = f.app.questions().get_question(view.question_id).await.unwrap();
    let QuestionKind::MultipleChoice(mc) = question.kind else {
        panic!("expected multiple choice");
    };
    let right = mc.answers.iter().find(|a| a.correct).unwrap();
    Guess::Choices(vec![right.id])
}

/// Append an uncategorized question to the fixture quiz; it takes the next order.
async fn add_question(f: &Fixture, content: &str, kind: QuestionKindDraft) {
    f.app
        .questions()
        .create_question(QuestionDraft {
            content: content.into(),
            explanation: String::new(),
            category_id: None,
            sub_category_id: None,
            figure: None,
            quiz_ids: vec![f.quiz],
            kind,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn study_mode_reveals_each_answer_and_discards_the_sitting() {
    let f = fixture(|_| {}).await;
    let sittings = f.app.sittings();
    let sitting = start(&f, SittingMode::Study).await;

    let before = sittings.question_view(&f.student, sitting, 1).await.unwrap();
    assert_eq!(before.question_count, 3);
    assert!(!before.revealed);
    assert!(before.answers.iter().all(|a| a.correct.is_none()));

    let guess = correct_choice(&f, sitting).await;
    let outcome = sittings
        .submit_answer(&f.student, sitting, 1, guess)
        .await
        .unwrap();
    let AnswerOutcome::Revealed(reveal) = outcome else {
        panic!("study mode should reveal");
    };
    assert!(reveal.is_correct);
    assert_eq!(reveal.user_answer, "Nile");
    assert_eq!(reveal.correct_answers.len(), 1);
    assert_eq!(reveal.next_order, Some(2));

    let after = sittings.question_view(&f.student, sitting, 1).await.unwrap();
    assert!(after.revealed);
    assert_eq!(after.is_correct, Some(true));
    assert_eq!(after.answered, 1);

    let again = correct_choice(&f, sitting).await;
    let err = sittings
        .submit_answer(&f.student, sitting, 1, again)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SittingServiceError::Sitting(SittingError::AlreadyAnswered(1))
    ));

    sittings
        .submit_answer(&f.student, sitting, 2, Guess::Text("FALSE".into()))
        .await
        .unwrap();

    let result = sittings.finish(&f.student, sitting).await.unwrap();
    assert_eq!(result.score, 1);
    assert_eq!(result.max_score, 3);
    assert_eq!(result.percent, 33);
    assert!(!result.passed);
    assert_eq!(result.message, "try again");
    assert!(!result.kept);
    assert!(result.questions.is_empty());

    let err = sittings.results(&f.student, sitting).await.unwrap_err();
    assert!(matches!(err, SittingServiceError::Storage(StorageError::NotFound)));
}

#[tokio::test]
async fn exam_mode_moves_on_and_keeps_exam_papers() {
    let f = fixture(|d| d.exam_paper = true).await;
    let sittings = f.app.sittings();
    let sitting = start(&f, SittingMode::Exam).await;

    let guess = correct_choice(&f, sitting).await;
    let outcome = sittings
        .submit_answer(&f.student, sitting, 1, guess)
        .await
        .unwrap();
    assert_eq!(outcome, AnswerOutcome::Next { next_order: Some(2) });

    sittings
        .submit_answer(&f.student, sitting, 2, Guess::Bool(true))
        .await
        .unwrap();
    let outcome = sittings
        .submit_answer(&f.student, sitting, 3, Guess::Text(" 2.0 ".into()))
        .await
        .unwrap();
    assert_eq!(outcome, AnswerOutcome::Next { next_order: None });

    let result = sittings.finish(&f.student, sitting).await.unwrap();
    assert_eq!(result.percent, 100);
    assert!(result.passed);
    assert_eq!(result.message, "well done");
    assert!(result.kept);
    assert_eq!(result.questions.len(), 3);
    assert!(result.questions.iter().all(|q| q.mark == AnswerMark::Correct));

    let again = sittings.results(&f.student, sitting).await.unwrap();
    assert_eq!(again.score, 3);

    let listed = sittings.list_sittings(&f.student).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].complete);
    assert_eq!(listed[0].quiz_title, "Rivers");

    let report = f.app.progress().progress(f.student.id()).await.unwrap();
    assert_eq!(report.exams.len(), 1);
    assert_eq!(report.categories.len(), 1);
    assert_eq!(report.categories[0].category, "geography");
    assert_eq!(
        (report.categories[0].correct, report.categories[0].possible),
        (2, 2)
    );
}

#[tokio::test]
async fn essays_are_stored_whole_and_left_for_the_marker() {
    let f = fixture(|_| {}).await;
    add_question(&f, "Describe the course of the Rhine.", QuestionKindDraft::Essay).await;
    let sittings = f.app.sittings();
    let sitting = start(&f, SittingMode::Study).await;

    let essay = "The Rhine rises in the Swiss Alps, forms part of the border with \
                 Liechtenstein and Austria, crosses Lake Constance and reaches the \
                 North Sea in the Netherlands."
        .to_string();
    assert!(essay.chars().count() > 100);

    let outcome = sittings
        .submit_answer(&f.student, sitting, 4, Guess::Text(essay.clone()))
        .await
        .unwrap();
    let AnswerOutcome::Revealed(reveal) = outcome else {
        panic!("study mode should reveal");
    };
    assert!(reveal.needs_manual_marking);
    assert!(!reveal.is_correct);
    assert_eq!(reveal.next_order, None);

    let stored = sittings.explanation(&f.student, sitting, 4).await.unwrap();
    assert_eq!(stored.user_answer.as_deref(), Some(essay.as_str()));
    assert_eq!(stored.is_correct, None);
}

#[tokio::test]
async fn long_answers_to_marked_questions_are_cut_to_fifty_characters() {
    let f = fixture(|_| {}).await;
    add_question(
        &f,
        "Which river flows through Paris?",
        QuestionKindDraft::Open {
            answer: "Seine".into(),
            answer_type: OpenAnswerType::Text,
        },
    )
    .await;
    let sittings = f.app.sittings();
    let sitting = start(&f, SittingMode::Exam).await;

    let long = "é".repeat(30) + &"x".repeat(30);
    sittings
        .submit_answer(&f.student, sitting, 4, Guess::Text(long.clone()))
        .await
        .unwrap();

    let stored = sittings.explanation(&f.student, sitting, 4).await.unwrap();
    let expected: String = long.chars().take(50).collect();
    assert_eq!(stored.user_answer, Some(expected));
    assert_eq!(stored.is_correct, Some(false));
}

#[tokio::test]
async fn open_sittings_are_resumed_and_single_attempts_enforced() {
    let f = fixture(|d| d.single_attempt = true).await;
    let sittings = f.app.sittings();

    let first = start(&f, SittingMode::Exam).await;
    assert_eq!(start(&f, SittingMode::Exam).await, first);
    assert_ne!(start(&f, SittingMode::Study).await, first);

    sittings.finish(&f.student, first).await.unwrap();
    let outcome = sittings
        .start(&f.student, &f.slug, SittingMode::Exam)
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::AlreadyCompleted { quiz_id: f.quiz });
}

#[tokio::test]
async fn other_users_cannot_see_a_sitting() {
    let f = fixture(|_| {}).await;
    let sitting = start(&f, SittingMode::Study).await;
    let intruder = f
        .app
        .users()
        .register("other@example.com", "password1", "")
        .await
        .unwrap();

    let err = f
        .app
        .sittings()
        .question_view(&intruder, sitting, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, SittingServiceError::Storage(StorageError::NotFound)));
    assert!(f.app.sittings().delete(&intruder, sitting).await.is_err());
    f.app.sittings().delete(&f.student, sitting).await.unwrap();
}

#[tokio::test]
async fn quiz_without_questions_cannot_be_started() {
    let f = fixture(|_| {}).await;
    f.app
        .quizzes()
        .create_quiz(QuizDraft {
            title: "Empty".into(),
            url: "empty".into(),
            ..QuizDraft::default()
        })
        .await
        .unwrap();
    let err = f
        .app
        .sittings()
        .start(&f.student, "empty", SittingMode::Study)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SittingServiceError::Sitting(SittingError::NoQuestions)
    ));
}

#[tokio::test]
async fn markers_toggle_completed_answers() {
    let f = fixture(|d| d.exam_paper = true).await;
    let sittings = f.app.sittings();
    let sitting = start(&f, SittingMode::Exam).await;
    sittings
        .submit_answer(&f.student, sitting, 2, Guess::Bool(false))
        .await
        .unwrap();

    let marking = f.app.marking();
    let err = marking
        .toggle(&f.student, sitting, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, MarkingServiceError::PermissionDenied));

    let marker = f
        .app
        .users()
        .create_superuser("marker@example.com", "password1")
        .await
        .unwrap();
    assert!(marker.permissions().has_view_sittings());
    assert_ne!(marker.permissions(), Permissions::default());

    let err = marking.toggle(&marker, sitting, 2).await.unwrap_err();
    assert!(matches!(
        err,
        MarkingServiceError::Sitting(SittingError::NotComplete)
    ));

    sittings.finish(&f.student, sitting).await.unwrap();
    let listed = marking
        .list(
            &marker,
            &SittingFilter {
                quiz_title_contains: Some("riv".into()),
                user_contains: Some("STU".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user, "Stu");

    let toggled = marking.toggle(&marker, sitting, 2).await.unwrap();
    assert_eq!(toggled.mark, AnswerMark::Correct);
    assert_eq!(toggled.score, 1);

    let detail = marking.detail(&marker, sitting).await.unwrap();
    assert_eq!(detail.sitting.score, 1);
    assert_eq!(detail.questions[1].is_correct, Some(true));

    let toggled = marking.toggle(&marker, sitting, 2).await.unwrap();
    assert_eq!(toggled.mark, AnswerMark::Incorrect);
    assert_eq!(toggled.score, 0);
}
