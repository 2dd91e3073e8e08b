#![forbid(unsafe_code)]

pub mod app_services;
pub mod category_service;
pub mod contact_service;
mod credentials;
pub mod error;
pub mod export;
pub mod marking_service;
pub mod progress_service;
pub mod question_service;
pub mod quiz_service;
pub mod sittings;
pub mod user_service;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use category_service::CategoryService;
pub use contact_service::{ContactService, LogMailer, Mailer};
pub use error::{
    AppServicesError, CategoryServiceError, ContactServiceError, MarkingServiceError,
    ProgressServiceError, QuestionServiceError, QuizServiceError, SittingServiceError,
    UserServiceError,
};
pub use export::{QuestionExport, QuizExport};
pub use marking_service::{MarkingDetail, MarkingListItem, MarkingService, ToggleOutcome};
pub use progress_service::{CategoryProgress, ProgressReport, ProgressService};
pub use question_service::QuestionService;
pub use quiz_service::QuizService;
pub use sittings::{
    AnswerChoice, AnswerOutcome, AnswerReveal, ExplanationView, QuestionView, ResultQuestion,
    SittingResult, SittingService, SittingSummary, StartOutcome,
};
pub use user_service::{LoginSession, ProfileUpdate, UserService};
