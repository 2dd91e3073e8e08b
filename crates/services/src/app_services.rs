use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::category_service::CategoryService;
use crate::contact_service::{ContactService, LogMailer, Mailer};
use crate::error::AppServicesError;
use crate::marking_service::MarkingService;
use crate::progress_service::ProgressService;
use crate::question_service::QuestionService;
use crate::quiz_service::QuizService;
use crate::sittings::SittingService;
use crate::user_service::UserService;

/// Assembles every app-facing service over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    users: Arc<UserService>,
    categories: Arc<CategoryService>,
    quizzes: Arc<QuizService>,
    questions: Arc<QuestionService>,
    sittings: Arc<SittingService>,
    progress: Arc<ProgressService>,
    marking: Arc<MarkingService>,
    contact: Arc<ContactService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, logging contact mails.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, Arc::new(LogMailer)))
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, Arc::new(LogMailer))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, mailer: Arc<dyn Mailer>) -> Self {
        let users = Arc::new(UserService::new(clock, Arc::clone(&storage.users)));
        let categories = Arc::new(CategoryService::new(Arc::clone(&storage.categories)));
        let quizzes = Arc::new(QuizService::new(
            clock,
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.categories),
        ));
        let questions = Arc::new(QuestionService::new(Arc::clone(&storage.questions)));
        let sittings = Arc::new(SittingService::new(
            clock,
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.categories),
            Arc::clone(&storage.sittings),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.progress),
            Arc::clone(&storage.categories),
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.sittings),
        ));
        let marking = Arc::new(MarkingService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sittings),
        ));
        let contact = Arc::new(ContactService::new(mailer));

        Self {
            users,
            categories,
            quizzes,
            questions,
            sittings,
            progress,
            marking,
            contact,
        }
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn categories(&self) -> Arc<CategoryService> {
        Arc::clone(&self.categories)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionService> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn sittings(&self) -> Arc<SittingService> {
        Arc::clone(&self.sittings)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn marking(&self) -> Arc<MarkingService> {
        Arc::clone(&self.marking)
    }

    #[must_use]
    pub fn contact(&self) -> Arc<ContactService> {
        Arc::clone(&self.contact)
    }
}
