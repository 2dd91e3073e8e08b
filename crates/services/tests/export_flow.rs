use quiz_core::model::{AnswerDraft, QuestionDraft, QuestionKindDraft, QuizDraft, QuizId};
use quiz_core::time::fixed_now;
use services::{AppServices, Clock, QuizServiceError};
use storage::repository::StorageError;

#[tokio::test]
async fn export_inlines_questions_answers_and_category_names() {
    let app = AppServices::in_memory(Clock::Fixed(fixed_now()));
    let category = app
        .categories()
        .create_category("Squishy berries", "")
        .await
        .unwrap();
    let sub = app
        .categories()
        .create_sub_category(category.id(), "Red")
        .await
        .unwrap();
    let quiz = app
        .quizzes()
        .create_quiz(QuizDraft {
            title: "Berries".into(),
            url: "berries".into(),
            category_id: Some(category.id()),
            pass_mark: 60,
            ..QuizDraft::default()
        })
        .await
        .unwrap();
    app.questions()
        .create_question(QuestionDraft {
            content: "Which are red?".into(),
            explanation: String::new(),
            category_id: Some(category.id()),
            sub_category_id: Some(sub.id()),
            figure: None,
            quiz_ids: vec![quiz.id()],
            kind: QuestionKindDraft::MultipleChoice {
                answer_order: None,
                allow_multiple_answers: true,
                answers: vec![
                    AnswerDraft {
                        id: None,
                        content: "Raspberry".into(),
                        correct: true,
                    },
                    AnswerDraft {
                        id: None,
                        content: "Blueberry".into(),
                        correct: false,
                    },
                ],
            },
        })
        .await
        .unwrap();
    app.questions()
        .create_question(QuestionDraft {
            content: "Describe a berry.".into(),
            explanation: String::new(),
            category_id: None,
            sub_category_id: None,
            figure: None,
            quiz_ids: vec![quiz.id()],
            kind: QuestionKindDraft::Essay,
        })
        .await
        .unwrap();

    let export = app.quizzes().export(quiz.id()).await.unwrap();
    assert_eq!(export.category.as_deref(), Some("squishy-berries"));
    assert_eq!(export.questions.len(), 2);
    assert_eq!(export.questions[0].sub_category.as_deref(), Some("Red"));
    assert_eq!(app.quizzes().max_score(quiz.id()).await.unwrap(), 2);

    let json = serde_json::to_value(&export).unwrap();
    assert_eq!(json["url"], "berries");
    assert_eq!(json["pass_mark"], 60);
    assert_eq!(json["questions"][0]["type"], "multiple_choice");
    assert_eq!(json["questions"][0]["answers"][0]["content"], "Raspberry");
    assert_eq!(json["questions"][0]["answers"][0]["correct"], true);
    assert_eq!(json["questions"][1]["type"], "essay");
}

#[tokio::test]
async fn export_of_unknown_quiz_is_not_found() {
    let app = AppServices::in_memory(Clock::Fixed(fixed_now()));
    let err = app.quizzes().export(QuizId::new(42)).await.unwrap_err();
    assert!(matches!(err, QuizServiceError::Storage(StorageError::NotFound)));
}
