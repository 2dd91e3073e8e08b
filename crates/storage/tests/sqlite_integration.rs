use quiz_core::model::{
    AnswerDraft, AnswerMark, CategoryName, Email, NewCategory, NewSitting, OpenAnswerType,
    Permissions, Profile, QuestionDraft, QuestionKind, QuestionKindDraft, QuizDraft, QuizSlug,
    SittingError, SittingMode, UserId,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    AnswerRecord, CategoryRepository, NewQuizRecord, NewUserRecord, ProgressRepository, QuestionRepository,
    QuizFilter, QuizRepository, SittingFilter, SittingRepository, StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn user(email: &str) -> NewUserRecord {
    NewUserRecord {
        email: Email::parse(email).unwrap(),
        password_hash: "sha256$1$salt$digest".into(),
        profile: Profile {
            name: "Ann".into(),
            ..Profile::default()
        },
        permissions: Permissions::default(),
        is_active: true,
        created_at: fixed_now(),
    }
}

fn quiz(title: &str, url: &str) -> NewQuizRecord {
    NewQuizRecord {
        details: QuizDraft {
            title: title.into(),
            url: url.into(),
            pass_mark: 50,
            ..QuizDraft::default()
        }
        .validate()
        .unwrap(),
        created_at: fixed_now(),
    }
}

fn multiple_choice(quizzes: Vec<quiz_core::model::QuizId>) -> QuestionDraft {
    QuestionDraft {
        content: "Pick one".into(),
        explanation: "Because".into(),
        category_id: None,
        sub_category_id: None,
        figure: None,
        quiz_ids: quizzes,
        kind: QuestionKindDraft::MultipleChoice {
            answer_order: None,
            allow_multiple_answers: false,
            answers: vec![
                AnswerDraft {
                    id: None,
                    content: "right".into(),
                    correct: true,
                },
                AnswerDraft {
                    id: None,
                    content: "wrong".into(),
                    correct: false,
                },
            ],
        },
    }
}

#[tokio::test]
async fn users_and_tokens_round_trip() {
    let repo = repo("memdb_users").await;
    let id = repo.insert_user(user("ann@example.com")).await.unwrap();

    let err = repo.insert_user(user("ann@EXAMPLE.com")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let stored = repo
        .find_user_by_email(&Email::parse("ann@example.com").unwrap())
        .await
        .unwrap()
        .expect("user");
    assert_eq!(stored.user.id(), id);
    assert_eq!(stored.password_hash, "sha256$1$salt$digest");

    repo.insert_token("digest", id, fixed_now()).await.unwrap();
    let by_token = repo.user_for_token("digest").await.unwrap().expect("token");
    assert_eq!(by_token.name(), "Ann");

    repo.delete_token("digest").await.unwrap();
    assert!(repo.user_for_token("digest").await.unwrap().is_none());

    let mut changed = repo.get_user(id).await.unwrap();
    changed.set_permissions(Permissions {
        can_edit_quizzes: true,
        ..Permissions::default()
    });
    repo.update_user(&changed).await.unwrap();
    assert!(
        repo.get_user(id)
            .await
            .unwrap()
            .permissions()
            .has_edit_quizzes()
    );
}

#[tokio::test]
async fn categories_are_unique_and_sorted() {
    let repo = repo("memdb_categories").await;
    let pears = repo
        .insert_category(NewCategory::new("Pears", "").unwrap())
        .await
        .unwrap();
    repo.insert_category(NewCategory::new("apples", "").unwrap())
        .await
        .unwrap();
    let err = repo
        .insert_category(NewCategory::new("PEARS", "").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let names: Vec<String> = repo
        .list_categories()
        .await
        .unwrap()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(names, vec!["apples", "pears"]);

    let sub = repo.insert_sub_category("Green", pears.id()).await.unwrap();
    let subs = repo.list_sub_categories(pears.id()).await.unwrap();
    assert_eq!(subs, vec![sub]);
}

#[tokio::test]
async fn quizzes_and_questions_round_trip() {
    let repo = repo("memdb_quizzes").await;
    let q1 = repo.insert_quiz(quiz("Rivers", "rivers")).await.unwrap();
    let err = repo.insert_quiz(quiz("Other", "rivers")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let slug = QuizSlug::normalize("rivers").unwrap();
    let found = repo.find_quiz_by_slug(&slug).await.unwrap().expect("quiz");
    assert_eq!(found.id(), q1);
    assert_eq!(found.pass_mark(), 50);

    let mc = repo
        .insert_question(multiple_choice(vec![q1]).validate().unwrap())
        .await
        .unwrap();
    let open = repo
        .insert_question(
            QuestionDraft {
                content: "How many?".into(),
                explanation: String::new(),
                category_id: None,
                sub_category_id: None,
                figure: None,
                quiz_ids: vec![q1],
                kind: QuestionKindDraft::Open {
                    answer: "42".into(),
                    answer_type: OpenAnswerType::Number,
                },
            }
            .validate()
            .unwrap(),
        )
        .await
        .unwrap();

    let loaded = repo.questions_for_quiz(q1).await.unwrap();
    assert_eq!(loaded, vec![mc.clone(), open.clone()]);

    let QuestionKind::MultipleChoice(choices) = &mc.kind else {
        panic!("expected multiple choice");
    };
    let kept = choices.answers[0].id;
    let mut update = multiple_choice(vec![q1]);
    if let QuestionKindDraft::MultipleChoice { answers, .. } = &mut update.kind {
        answers[0].id = Some(kept);
        answers[1].content = "also wrong".into();
    }
    let updated = repo
        .update_question(mc.id, update.validate().unwrap())
        .await
        .unwrap();
    assert_eq!(repo.get_question(mc.id).await.unwrap(), updated);
    let QuestionKind::MultipleChoice(choices) = &updated.kind else {
        panic!("expected multiple choice");
    };
    assert_eq!(choices.answers[0].id, kept);
    assert_eq!(choices.answers[1].content, "also wrong");

    repo.set_quiz_questions(q1, &[open.id]).await.unwrap();
    let ids: Vec<_> = repo
        .questions_for_quiz(q1)
        .await
        .unwrap()
        .iter()
        .map(|q| q.id)
        .collect();
    assert_eq!(ids, vec![open.id]);

    let mut draft_quiz = quiz("Hidden", "hidden");
    draft_quiz.details.draft = true;
    repo.insert_quiz(draft_quiz).await.unwrap();
    assert_eq!(repo.list_quizzes(&QuizFilter::published()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sittings_persist_marks_and_answers() {
    let repo = repo("memdb_sittings").await;
    let user_id = repo.insert_user(user("bob@example.com")).await.unwrap();
    let quiz_id = repo.insert_quiz(quiz("Lakes", "lakes")).await.unwrap();
    let question = repo
        .insert_question(multiple_choice(vec![quiz_id]).validate().unwrap())
        .await
        .unwrap();

    let new = NewSitting::new(
        user_id,
        quiz_id,
        SittingMode::Exam,
        vec![question.id],
        fixed_now(),
    )
    .unwrap();
    let id = repo.insert_sitting(new).await.unwrap();

    let sitting = repo
        .find_open_sitting(user_id, quiz_id, SittingMode::Exam)
        .await
        .unwrap()
        .expect("open sitting");
    assert_eq!(sitting.id(), id);
    assert_eq!(sitting.progress(), (0, 1));
    assert!(repo.get_user_answer(id, 1).await.unwrap().answer.is_none());

    let answered = repo
        .record_answer(AnswerRecord {
            sitting: id,
            order: 1,
            is_correct: true,
            answer: "1".into(),
            stored_correct: Some(true),
            category: None,
        })
        .await
        .unwrap();
    assert_eq!(answered.current_score(), 1);

    let completed = repo.complete_sitting(id, fixed_now()).await.unwrap();
    let reloaded = repo.get_sitting(id).await.unwrap();
    assert_eq!(reloaded, completed);
    assert_eq!(reloaded.mark_at(1), Some(AnswerMark::Correct));
    assert!(
        repo.has_completed_sitting(user_id, quiz_id, SittingMode::Exam)
            .await
            .unwrap()
    );
    let answer = repo.get_user_answer(id, 1).await.unwrap();
    assert_eq!(answer.answer.as_deref(), Some("1"));
    assert_eq!(answer.is_correct, Some(true));
    assert_eq!(repo.list_user_answers(id).await.unwrap(), vec![answer]);

    let toggled = repo.toggle_mark(id, 1).await.unwrap();
    assert_eq!(toggled.current_score(), 0);
    assert_eq!(repo.get_user_answer(id, 1).await.unwrap().is_correct, Some(false));

    let listed = repo
        .list_completed_sittings(&SittingFilter {
            quiz_title_contains: Some("LAK".into()),
            user_contains: Some("bob".into()),
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    repo.delete_sitting(id).await.unwrap();
    assert!(repo.list_user_answers(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_answer_leaves_sitting_and_progress_untouched() {
    let repo = repo("memdb_progress").await;
    let user_id = repo.insert_user(user("cy@example.com")).await.unwrap();
    let quiz_id = repo.insert_quiz(quiz("Fruit", "fruit")).await.unwrap();
    let question = repo
        .insert_question(multiple_choice(vec![quiz_id]).validate().unwrap())
        .await
        .unwrap();
    assert!(repo.get_progress(user_id).await.unwrap().encode().is_empty());

    let new = NewSitting::new(
        user_id,
        quiz_id,
        SittingMode::Study,
        vec![question.id],
        fixed_now(),
    )
    .unwrap();
    let id = repo.insert_sitting(new).await.unwrap();
    let name = CategoryName::normalize("apples").unwrap();
    let record = AnswerRecord {
        sitting: id,
        order: 1,
        is_correct: true,
        answer: "7".into(),
        stored_correct: Some(true),
        category: Some(name.clone()),
    };
    repo.record_answer(record.clone()).await.unwrap();

    let err = repo
        .record_answer(AnswerRecord {
            is_correct: false,
            answer: "8".into(),
            ..record
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Sitting(SittingError::AlreadyAnswered(1))
    ));

    let stored = repo.get_progress(user_id).await.unwrap();
    assert_eq!(stored.score_for(&name).triple(), [1, 1, 100]);
    assert_eq!(stored.user_id(), UserId::new(user_id.value()));
    assert_eq!(repo.get_sitting(id).await.unwrap().current_score(), 1);
    assert_eq!(
        repo.get_user_answer(id, 1).await.unwrap().answer.as_deref(),
        Some("7")
    );
}
