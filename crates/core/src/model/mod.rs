mod category;
mod contact;
mod ids;
mod progress;
mod question;
mod quiz;
pub mod sitting;
mod user;

pub use ids::{
    AnswerId, CategoryId, ParseIdError, QuestionId, QuizId, SittingId, SubCategoryId, UserId,
};

pub use category::{Category, CategoryError, CategoryName, NewCategory, SubCategory};
pub use contact::{ContactError, ContactMessage, ValidContactMessage};
pub use progress::{CategoryScore, Progress, ProgressError};
pub use question::{
    AnswerDraft, AnswerOption, AnswerOrder, DisplayAnswer, Guess, GuessError, MultipleChoice,
    OpenAnswerType, Question, QuestionDraft, QuestionError, QuestionKind, QuestionKindDraft,
    ValidatedQuestion,
};
pub use quiz::{Quiz, QuizDetails, QuizDraft, QuizError, QuizKind, QuizSlug};
pub use sitting::{AnswerMark, NewSitting, Sitting, SittingError, SittingMode, UserAnswer};
pub use user::{Email, Gender, Language, Password, Permissions, Profile, User, UserError};
