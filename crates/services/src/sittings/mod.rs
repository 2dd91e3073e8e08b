mod plan;
mod service;
mod view;

// Public API of the sitting subsystem.
pub use crate::error::SittingServiceError;
pub use plan::SittingPlanner;
pub(crate) use service::{result_questions, summarize};
pub use service::SittingService;
pub use view::{
    AnswerChoice, AnswerOutcome, AnswerReveal, ExplanationView, QuestionView, ResultQuestion,
    SittingResult, SittingSummary, StartOutcome,
};
