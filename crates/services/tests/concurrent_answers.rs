use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    Guess, NewSitting, QuestionDraft, QuestionKindDraft, QuizDraft, QuizId, Sitting,
    SittingError, SittingId, SittingMode, User, UserAnswer, UserId,
};
use quiz_core::time::fixed_now;
use services::{AppServices, Clock, LogMailer, SittingServiceError, StartOutcome};
use storage::repository::{AnswerRecord, SittingFilter, SittingRepository, Storage, StorageError};

/// Hands control back to the scheduler after every sitting read, so two
/// submissions both see the sitting before either one writes.
struct YieldingSittings(Arc<dyn SittingRepository>);

#[async_trait]
impl SittingRepository for YieldingSittings {
    async fn insert_sitting(&self, sitting: NewSitting) -> Result<SittingId, StorageError> {
        self.0.insert_sitting(sitting).await
    }

    async fn record_answer(&self, record: AnswerRecord) -> Result<Sitting, StorageError> {
        self.0.record_answer(record).await
    }

    async fn toggle_mark(&self, sitting: SittingId, order: u32) -> Result<Sitting, StorageError> {
        self.0.toggle_mark(sitting, order).await
    }

    async fn complete_sitting(
        &self,
        sitting: SittingId,
        end: DateTime<Utc>,
    ) -> Result<Sitting, StorageError> {
        self.0.complete_sitting(sitting, end).await
    }

    async fn get_sitting(&self, id: SittingId) -> Result<Sitting, StorageError> {
        let sitting = self.0.get_sitting(id).await;
        tokio::task::yield_now().await;
        sitting
    }

    async fn find_open_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<Option<Sitting>, StorageError> {
        self.0.find_open_sitting(user, quiz, mode).await
    }

    async fn has_completed_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<bool, StorageError> {
        self.0.has_completed_sitting(user, quiz, mode).await
    }

    async fn list_user_sittings(&self, user: UserId) -> Result<Vec<Sitting>, StorageError> {
        self.0.list_user_sittings(user).await
    }

    async fn list_completed_sittings(
        &self,
        filter: &SittingFilter,
    ) -> Result<Vec<Sitting>, StorageError> {
        self.0.list_completed_sittings(filter).await
    }

    async fn delete_sitting(&self, id: SittingId) -> Result<(), StorageError> {
        self.0.delete_sitting(id).await
    }

    async fn get_user_answer(
        &self,
        sitting: SittingId,
        order: u32,
    ) -> Result<UserAnswer, StorageError> {
        self.0.get_user_answer(sitting, order).await
    }

    async fn list_user_answers(
        &self,
        sitting: SittingId,
    ) -> Result<Vec<UserAnswer>, StorageError> {
        self.0.list_user_answers(sitting).await
    }
}

/// Two true/false questions in the "Geography" category; `true` then `false`
/// are the right answers.
async fn setup() -> (AppServices, User, SittingId) {
    let storage = Storage::in_memory();
    let storage = Storage {
        sittings: Arc::new(YieldingSittings(Arc::clone(&storage.sittings))),
        ..storage
    };
    let app = AppServices::from_storage(&storage, Clock::Fixed(fixed_now()), Arc::new(LogMailer));

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
    let quiz = app
        .quizzes()
        .create_quiz(QuizDraft {
            title: "Rivers".into(),
            url: "rivers".into(),
            category_id: Some(category.id()),
            ..QuizDraft::default()
        })
        .await
        .unwrap();
    for (content, correct) in [
        ("The Danube flows into the Black Sea.", true),
        ("The Thames flows through Paris.", false),
    ] {
        app.questions()
            .create_question(QuestionDraft {
                content: content.into(),
                explanation: String::new(),
                category_id: Some(category.id()),
                sub_category_id: None,
                figure: None,
                quiz_ids: vec![quiz.id()],
                kind: QuestionKindDraft::TrueFalse { correct },
            })
            .await
            .unwrap();
    }

    let outcome = app
        .sittings()
        .start(&student, "rivers", SittingMode::Exam)
        .await
        .unwrap();
    let StartOutcome::Started { sitting_id, .. } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    (app, student, sitting_id)
}

async fn geography_totals(app: &AppServices, user: &User) -> (u32, u32) {
    let report = app.progress().progress(user.id()).await.unwrap();
    assert_eq!(report.categories.len(), 1);
    (report.categories[0].correct, report.categories[0].possible)
}

#[tokio::test]
async fn simultaneous_answers_to_different_questions_are_both_kept() {
    let (app, student, sitting) = setup().await;
    let sittings = app.sittings();

    let (first, second) = tokio::join!(
        sittings.submit_answer(&student, sitting, 1, Guess::Bool(true)),
        sittings.submit_answer(&student, sitting, 2, Guess::Bool(false)),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(geography_totals(&app, &student).await, (2, 2));
    let result = sittings.finish(&student, sitting).await.unwrap();
    assert_eq!(result.score, 2);
    assert_eq!(result.percent, 100);
}

#[tokio::test]
async fn simultaneous_answers_to_one_question_count_once() {
    let (app, student, sitting) = setup().await;
    let sittings = app.sittings();

    let (first, second) = tokio::join!(
        sittings.submit_answer(&student, sitting, 1, Guess::Bool(true)),
        sittings.submit_answer(&student, sitting, 1, Guess::Bool(true)),
    );
    let err = match (first, second) {
        (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
        (first, second) => panic!("expected one success, got {first:?} and {second:?}"),
    };
    assert!(matches!(
        err,
        SittingServiceError::Sitting(SittingError::AlreadyAnswered(1))
    ));

    assert_eq!(geography_totals(&app, &student).await, (1, 1));
    let result = sittings.finish(&student, sitting).await.unwrap();
    assert_eq!(result.score, 1);
}
