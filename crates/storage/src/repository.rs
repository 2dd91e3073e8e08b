use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerId, AnswerMark, AnswerOption, Category, CategoryId, CategoryName, Email, MultipleChoice,
    NewCategory, NewSitting, Permissions, Profile, Progress, Question, QuestionId,
    QuestionKind, QuestionKindDraft, Quiz, QuizDetails, QuizId, QuizSlug, Sitting, SittingError,
    SittingId, SittingMode, SubCategory, SubCategoryId, User, UserAnswer, UserId,
    ValidatedQuestion,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The stored sitting refused the change.
    #[error(transparent)]
    Sitting(#[from] SittingError),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Account data needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: Email,
    pub password_hash: String,
    pub profile: Profile,
    pub permissions: Permissions,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user together with the stored password hash.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewQuizRecord {
    pub details: QuizDetails,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizFilter {
    pub include_drafts: bool,
    pub category: Option<CategoryId>,
}

impl QuizFilter {
    #[must_use]
    pub fn published() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn matches(&self, quiz: &Quiz) -> bool {
        (self.include_drafts || !quiz.is_draft())
            && self.category.is_none_or(|c| quiz.category_id() == Some(c))
    }
}

/// One answered question, written together with the sitting marks and the
/// user's category progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub sitting: SittingId,
    pub order: u32,
    pub is_correct: bool,
    pub answer: String,
    /// Correctness kept on the answer row; `None` awaits manual marking.
    pub stored_correct: Option<bool>,
    /// Category credited with one attempt, if the question has one.
    pub category: Option<CategoryName>,
}

/// Case-insensitive substring filters for completed sittings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SittingFilter {
    pub quiz_title_contains: Option<String>,
    pub user_contains: Option<String>,
}

impl SittingFilter {
    fn matches(&self, quiz: Option<&Quiz>, user: Option<&User>) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        let quiz_ok = match self.quiz_title_contains.as_deref() {
            None | Some("") => true,
            Some(needle) => quiz.is_some_and(|q| contains(q.title(), needle)),
        };
        let user_ok = match self.user_contains.as_deref() {
            None | Some("") => true,
            Some(needle) => user.is_some_and(|u| {
                contains(u.email().as_str(), needle) || contains(u.name(), needle)
            }),
        };
        quiz_ok && user_ok
    }
}

//
// ─── REPOSITORY TRAITS ─────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the email is already registered.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_user(&self, id: UserId) -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<StoredUser>, StorageError>;

    /// Persist profile, permission and activity changes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn update_user(&self, user: &User) -> Result<(), StorageError>;

    /// Store a session token digest for a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` for a duplicate digest.
    async fn insert_token(
        &self,
        token_hash: &str,
        user: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>, StorageError>;

    /// Deleting an unknown token is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_token(&self, token_hash: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the name is taken.
    async fn insert_category(&self, category: NewCategory) -> Result<Category, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_category(&self, id: CategoryId) -> Result<Category, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_category_by_name(
        &self,
        name: &CategoryName,
    ) -> Result<Option<Category>, StorageError>;

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the parent category is missing.
    async fn insert_sub_category(
        &self,
        name: &str,
        category: CategoryId,
    ) -> Result<SubCategory, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_sub_categories(
        &self,
        category: CategoryId,
    ) -> Result<Vec<SubCategory>, StorageError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the slug is taken.
    async fn insert_quiz(&self, quiz: NewQuizRecord) -> Result<QuizId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` or `StorageError::Conflict` on a slug clash.
    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_quiz_by_slug(&self, slug: &QuizSlug) -> Result<Option<Quiz>, StorageError>;

    /// Quizzes matching `filter`, ordered by title.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StorageError>;

    /// Remove a quiz with its sittings and question links.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn delete_quiz(&self, id: QuizId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Store a question; multiple choice answers receive fresh ids.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if a referenced quiz is missing.
    async fn insert_question(&self, question: ValidatedQuestion)
    -> Result<Question, StorageError>;

    /// Replace a question. Answers carrying an id keep it, the rest are new,
    /// and stored answers missing from the input are removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question or an answer id is unknown.
    async fn update_question(
        &self,
        id: QuestionId,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// Questions attached to a quiz, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn questions_for_quiz(&self, quiz: QuizId) -> Result<Vec<Question>, StorageError>;

    /// Make `ids` the exact question set of `quiz`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz or a question is missing.
    async fn set_quiz_questions(
        &self,
        quiz: QuizId,
        ids: &[QuestionId],
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SittingRepository: Send + Sync {
    /// Store a sitting and one blank answer per question in one step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the sitting cannot be stored.
    async fn insert_sitting(&self, sitting: NewSitting) -> Result<SittingId, StorageError>;

    /// Apply an answer to the sitting marks, store it on the answer row and
    /// credit the category, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Sitting` when the sitting is complete, the order
    /// is unknown or already answered, and `StorageError::NotFound` if missing.
    async fn record_answer(&self, record: AnswerRecord) -> Result<Sitting, StorageError>;

    /// Flip one mark of a completed sitting and the matching answer row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Sitting` for an open sitting or unknown order,
    /// and `StorageError::NotFound` if missing.
    async fn toggle_mark(&self, sitting: SittingId, order: u32) -> Result<Sitting, StorageError>;

    /// Mark the sitting complete; a completed sitting keeps its end time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn complete_sitting(
        &self,
        sitting: SittingId,
        end: DateTime<Utc>,
    ) -> Result<Sitting, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_sitting(&self, id: SittingId) -> Result<Sitting, StorageError>;

    /// Oldest incomplete sitting of the user for this quiz and mode.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_open_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<Option<Sitting>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn has_completed_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<bool, StorageError>;

    /// Sittings of one user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_user_sittings(&self, user: UserId) -> Result<Vec<Sitting>, StorageError>;

    /// Completed sittings of every user matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_completed_sittings(
        &self,
        filter: &SittingFilter,
    ) -> Result<Vec<Sitting>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn delete_sitting(&self, id: SittingId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_user_answer(
        &self,
        sitting: SittingId,
        order: u32,
    ) -> Result<UserAnswer, StorageError>;

    /// Answers of a sitting in question order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_user_answers(&self, sitting: SittingId)
    -> Result<Vec<UserAnswer>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Stored progress, or an empty one for users without scores.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_progress(&self, user: UserId) -> Result<Progress, StorageError>;
}

//
// ─── QUESTION ASSEMBLY ─────────────────────────────────────────────────────────
//

/// Turn a validated question into a stored one, resolving answer ids.
///
/// `existing` holds the currently stored answer ids; drafts with an id must
/// reference one of them, drafts without one get an id from `next_answer_id`.
pub(crate) fn assemble_question(
    id: QuestionId,
    question: ValidatedQuestion,
    existing: &[AnswerId],
    mut next_answer_id: impl FnMut() -> Result<AnswerId, StorageError>,
) -> Result<Question, StorageError> {
    let kind = match question.kind {
        QuestionKindDraft::MultipleChoice {
            answer_order,
            allow_multiple_answers,
            answers,
        } => {
            let mut options = Vec::with_capacity(answers.len());
            for answer in answers {
                let answer_id = match answer.id {
                    Some(answer_id) if existing.contains(&answer_id) => answer_id,
                    Some(_) => return Err(StorageError::NotFound),
                    None => next_answer_id()?,
                };
                options.push(AnswerOption {
                    id: answer_id,
                    content: answer.content,
                    correct: answer.correct,
                });
            }
            QuestionKind::MultipleChoice(MultipleChoice {
                answer_order,
                allow_multiple_answers,
                answers: options,
            })
        }
        QuestionKindDraft::TrueFalse { correct } => QuestionKind::TrueFalse { correct },
        QuestionKindDraft::Open {
            answer,
            answer_type,
        } => QuestionKind::Open {
            answer,
            answer_type,
        },
        QuestionKindDraft::Essay => QuestionKind::Essay,
    };
    Ok(Question {
        id,
        content: question.content,
        explanation: question.explanation,
        category_id: question.category_id,
        sub_category_id: question.sub_category_id,
        figure: question.figure,
        quiz_ids: question.quiz_ids,
        kind,
    })
}

pub(crate) fn answer_ids(question: &Question) -> Vec<AnswerId> {
    match &question.kind {
        QuestionKind::MultipleChoice(mc) => mc.answers.iter().map(|a| a.id).collect(),
        _ => Vec::new(),
    }
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Sequences {
    user: u64,
    category: u64,
    sub_category: u64,
    quiz: u64,
    question: u64,
    answer: u64,
    sitting: u64,
}

fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[derive(Default)]
struct MemoryState {
    seq: Sequences,
    users: BTreeMap<UserId, StoredUser>,
    tokens: HashMap<String, UserId>,
    categories: BTreeMap<CategoryId, Category>,
    sub_categories: BTreeMap<SubCategoryId, SubCategory>,
    quizzes: BTreeMap<QuizId, Quiz>,
    questions: BTreeMap<QuestionId, Question>,
    sittings: BTreeMap<SittingId, Sitting>,
    user_answers: BTreeMap<(SittingId, u32), UserAnswer>,
    progress: HashMap<UserId, Progress>,
}

impl MemoryState {
    fn check_quizzes(&self, ids: &[QuizId]) -> Result<(), StorageError> {
        if ids.iter().all(|id| self.quizzes.contains_key(id)) {
            Ok(())
        } else {
            Err(StorageError::NotFound)
        }
    }

    fn remove_sitting(&mut self, id: SittingId) -> Option<Sitting> {
        let removed = self.sittings.remove(&id)?;
        self.user_answers.retain(|(sitting, _), _| *sitting != id);
        Some(removed)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Every table lives behind one lock so multi-table operations stay atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut guard = self.lock()?;
        if guard
            .users
            .values()
            .any(|stored| stored.user.email() == &user.email)
        {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(bump(&mut guard.seq.user));
        let stored = StoredUser {
            user: User::new(
                id,
                user.email,
                user.profile,
                user.permissions,
                user.is_active,
                user.created_at,
            ),
            password_hash: user.password_hash,
        };
        guard.users.insert(id, stored);
        Ok(id)
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let guard = self.lock()?;
        guard
            .users
            .get(&id)
            .map(|stored| stored.user.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<StoredUser>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .users
            .values()
            .find(|stored| stored.user.email() == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let stored = guard.users.get_mut(&user.id()).ok_or(StorageError::NotFound)?;
        stored.user = user.clone();
        Ok(())
    }

    async fn insert_token(
        &self,
        token_hash: &str,
        user: UserId,
        _created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&user) {
            return Err(StorageError::NotFound);
        }
        if guard.tokens.contains_key(token_hash) {
            return Err(StorageError::Conflict);
        }
        guard.tokens.insert(token_hash.to_string(), user);
        Ok(())
    }

    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .tokens
            .get(token_hash)
            .and_then(|id| guard.users.get(id))
            .map(|stored| stored.user.clone()))
    }

    async fn delete_token(&self, token_hash: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.tokens.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryRepository {
    async fn insert_category(&self, category: NewCategory) -> Result<Category, StorageError> {
        let mut guard = self.lock()?;
        if guard.categories.values().any(|c| c.name() == &category.name) {
            return Err(StorageError::Conflict);
        }
        let id = CategoryId::new(bump(&mut guard.seq.category));
        let category = category.assign_id(id);
        guard.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Category, StorageError> {
        let guard = self.lock()?;
        guard.categories.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_category_by_name(
        &self,
        name: &CategoryName,
    ) -> Result<Option<Category>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.categories.values().find(|c| c.name() == name).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let guard = self.lock()?;
        let mut categories: Vec<Category> = guard.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(categories)
    }

    async fn insert_sub_category(
        &self,
        name: &str,
        category: CategoryId,
    ) -> Result<SubCategory, StorageError> {
        let mut guard = self.lock()?;
        if !guard.categories.contains_key(&category) {
            return Err(StorageError::NotFound);
        }
        let id = SubCategoryId::new(bump(&mut guard.seq.sub_category));
        let sub = SubCategory::new(id, name, category)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.sub_categories.insert(id, sub.clone());
        Ok(sub)
    }

    async fn list_sub_categories(
        &self,
        category: CategoryId,
    ) -> Result<Vec<SubCategory>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .sub_categories
            .values()
            .filter(|s| s.category_id() == category)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn insert_quiz(&self, quiz: NewQuizRecord) -> Result<QuizId, StorageError> {
        let mut guard = self.lock()?;
        if guard.quizzes.values().any(|q| q.slug() == &quiz.details.slug) {
            return Err(StorageError::Conflict);
        }
        let id = QuizId::new(bump(&mut guard.seq.quiz));
        guard
            .quizzes
            .insert(id, Quiz::new(id, quiz.details, quiz.created_at));
        Ok(id)
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard
            .quizzes
            .values()
            .any(|q| q.id() != quiz.id() && q.slug() == quiz.slug())
        {
            return Err(StorageError::Conflict);
        }
        let stored = guard
            .quizzes
            .get_mut(&quiz.id())
            .ok_or(StorageError::NotFound)?;
        *stored = quiz.clone();
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let guard = self.lock()?;
        guard.quizzes.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_quiz_by_slug(&self, slug: &QuizSlug) -> Result<Option<Quiz>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.quizzes.values().find(|q| q.slug() == slug).cloned())
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.lock()?;
        let mut quizzes: Vec<Quiz> = guard
            .quizzes
            .values()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| a.title().cmp(b.title()).then(a.id().cmp(&b.id())));
        Ok(quizzes)
    }

    async fn delete_quiz(&self, id: QuizId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.quizzes.remove(&id).ok_or(StorageError::NotFound)?;
        for question in guard.questions.values_mut() {
            question.quiz_ids.retain(|q| *q != id);
        }
        let sittings: Vec<SittingId> = guard
            .sittings
            .values()
            .filter(|s| s.quiz_id() == id)
            .map(Sitting::id)
            .collect();
        for sitting in sittings {
            guard.remove_sitting(sitting);
        }
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_question(
        &self,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let mut guard = self.lock()?;
        guard.check_quizzes(&question.quiz_ids)?;
        let id = QuestionId::new(bump(&mut guard.seq.question));
        let seq = &mut guard.seq;
        let question = assemble_question(id, question, &[], || {
            Ok(AnswerId::new(bump(&mut seq.answer)))
        })?;
        guard.questions.insert(id, question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        id: QuestionId,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let mut guard = self.lock()?;
        guard.check_quizzes(&question.quiz_ids)?;
        let existing = guard
            .questions
            .get(&id)
            .map(answer_ids)
            .ok_or(StorageError::NotFound)?;
        let seq = &mut guard.seq;
        let question = assemble_question(id, question, &existing, || {
            Ok(AnswerId::new(bump(&mut seq.answer)))
        })?;
        guard.questions.insert(id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let guard = self.lock()?;
        guard.questions.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn questions_for_quiz(&self, quiz: QuizId) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .values()
            .filter(|q| q.quiz_ids.contains(&quiz))
            .cloned()
            .collect())
    }

    async fn set_quiz_questions(
        &self,
        quiz: QuizId,
        ids: &[QuestionId],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.check_quizzes(&[quiz])?;
        if !ids.iter().all(|id| guard.questions.contains_key(id)) {
            return Err(StorageError::NotFound);
        }
        for question in guard.questions.values_mut() {
            let wanted = ids.contains(&question.id);
            let present = question.quiz_ids.contains(&quiz);
            if wanted && !present {
                question.quiz_ids.push(quiz);
                question.quiz_ids.sort();
            } else if !wanted && present {
                question.quiz_ids.retain(|q| *q != quiz);
            }
        }
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.questions.remove(&id).ok_or(StorageError::NotFound)?;
        guard.user_answers.retain(|_, answer| answer.question_id != id);
        Ok(())
    }
}

#[async_trait]
impl SittingRepository for InMemoryRepository {
    async fn insert_sitting(&self, sitting: NewSitting) -> Result<SittingId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&sitting.user_id) {
            return Err(StorageError::NotFound);
        }
        guard.check_quizzes(&[sitting.quiz_id])?;
        let id = SittingId::new(bump(&mut guard.seq.sitting));
        let sitting = sitting.assign_id(id);
        for answer in UserAnswer::blanks_for(&sitting) {
            guard.user_answers.insert((id, answer.order), answer);
        }
        guard.sittings.insert(id, sitting);
        Ok(id)
    }

    async fn record_answer(&self, record: AnswerRecord) -> Result<Sitting, StorageError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let mut updated = state
            .sittings
            .get(&record.sitting)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        updated.record_answer(record.order, record.is_correct)?;
        let answer = state
            .user_answers
            .get_mut(&(record.sitting, record.order))
            .ok_or(StorageError::NotFound)?;
        answer.answer = Some(record.answer);
        answer.is_correct = record.stored_correct;
        state.sittings.insert(record.sitting, updated.clone());

        if let Some(category) = &record.category {
            state
                .progress
                .entry(updated.user_id())
                .or_insert_with(|| Progress::new(updated.user_id()))
                .update_score(category, i64::from(record.is_correct), 1);
        }
        Ok(updated)
    }

    async fn toggle_mark(&self, sitting: SittingId, order: u32) -> Result<Sitting, StorageError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let stored = state
            .sittings
            .get_mut(&sitting)
            .ok_or(StorageError::NotFound)?;
        let mark = stored.toggle_mark(order)?;
        if let Some(answer) = state.user_answers.get_mut(&(sitting, order)) {
            answer.is_correct = Some(mark == AnswerMark::Correct);
        }
        Ok(stored.clone())
    }

    async fn complete_sitting(
        &self,
        sitting: SittingId,
        end: DateTime<Utc>,
    ) -> Result<Sitting, StorageError> {
        let mut guard = self.lock()?;
        let stored = guard
            .sittings
            .get_mut(&sitting)
            .ok_or(StorageError::NotFound)?;
        stored.mark_complete(end);
        Ok(stored.clone())
    }

    async fn get_sitting(&self, id: SittingId) -> Result<Sitting, StorageError> {
        let guard = self.lock()?;
        guard.sittings.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_open_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<Option<Sitting>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .sittings
            .values()
            .find(|s| {
                s.user_id() == user && s.quiz_id() == quiz && s.mode() == mode && !s.is_complete()
            })
            .cloned())
    }

    async fn has_completed_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sittings.values().any(|s| {
            s.user_id() == user && s.quiz_id() == quiz && s.mode() == mode && s.is_complete()
        }))
    }

    async fn list_user_sittings(&self, user: UserId) -> Result<Vec<Sitting>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .sittings
            .values()
            .filter(|s| s.user_id() == user)
            .cloned()
            .collect())
    }

    async fn list_completed_sittings(
        &self,
        filter: &SittingFilter,
    ) -> Result<Vec<Sitting>, StorageError> {
        let guard = self.lock()?;
        let mut sittings: Vec<Sitting> = guard
            .sittings
            .values()
            .filter(|s| s.is_complete())
            .filter(|s| {
                filter.matches(
                    guard.quizzes.get(&s.quiz_id()),
                    guard.users.get(&s.user_id()).map(|stored| &stored.user),
                )
            })
            .cloned()
            .collect();
        sittings.sort_by(|a, b| b.end().cmp(&a.end()).then(b.id().cmp(&a.id())));
        Ok(sittings)
    }

    async fn delete_sitting(&self, id: SittingId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .remove_sitting(id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn get_user_answer(
        &self,
        sitting: SittingId,
        order: u32,
    ) -> Result<UserAnswer, StorageError> {
        let guard = self.lock()?;
        guard
            .user_answers
            .get(&(sitting, order))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_user_answers(
        &self,
        sitting: SittingId,
    ) -> Result<Vec<UserAnswer>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .user_answers
            .range((sitting, 0)..=(sitting, u32::MAX))
            .map(|(_, answer)| answer.clone())
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(&self, user: UserId) -> Result<Progress, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .get(&user)
            .cloned()
            .unwrap_or_else(|| Progress::new(user)))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub sittings: Arc<dyn SittingRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    pub(crate) fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + CategoryRepository
            + QuizRepository
            + QuestionRepository
            + SittingRepository
            + ProgressRepository
            + Clone
            + 'static,
    {
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let categories: Arc<dyn CategoryRepository> = Arc::new(repo.clone());
        let quizzes: Arc<dyn QuizRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let sittings: Arc<dyn SittingRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            users,
            categories,
            quizzes,
            questions,
            sittings,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerDraft, QuestionDraft, QuizDraft};
    use quiz_core::time::fixed_now;

    fn quiz_record(title: &str, url: &str) -> NewQuizRecord {
        NewQuizRecord {
            details: QuizDraft {
                title: title.into(),
                url: url.into(),
                ..QuizDraft::default()
            }
            .validate()
            .unwrap(),
            created_at: fixed_now(),
        }
    }

    fn user_record(email: &str) -> NewUserRecord {
        NewUserRecord {
            email: Email::parse(email).unwrap(),
            password_hash: "hash".into(),
            profile: Profile::default(),
            permissions: Permissions::default(),
            is_active: true,
            created_at: fixed_now(),
        }
    }

    fn mc_question(quiz: QuizId) -> ValidatedQuestion {
        QuestionDraft {
            content: "Which?".into(),
            explanation: String::new(),
            category_id: None,
            sub_category_id: None,
            figure: None,
            quiz_ids: vec![quiz],
            kind: QuestionKindDraft::MultipleChoice {
                answer_order: None,
                allow_multiple_answers: false,
                answers: vec![
                    AnswerDraft {
                        id: None,
                        content: "a".into(),
                        correct: true,
                    },
                    AnswerDraft {
                        id: None,
                        content: "b".into(),
                        correct: false,
                    },
                ],
            },
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let repo = InMemoryRepository::new();
        repo.insert_user(user_record("a@b.c")).await.unwrap();
        let err = repo.insert_user(user_record("a@B.C")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn list_quizzes_hides_drafts_and_orders_by_title() {
        let repo = InMemoryRepository::new();
        repo.insert_quiz(quiz_record("zebra", "z")).await.unwrap();
        repo.insert_quiz(quiz_record("apple", "a")).await.unwrap();
        let mut draft = quiz_record("hidden", "h");
        draft.details.draft = true;
        repo.insert_quiz(draft).await.unwrap();

        let titles: Vec<String> = repo
            .list_quizzes(&QuizFilter::published())
            .await
            .unwrap()
            .iter()
            .map(|q| q.title().to_string())
            .collect();
        assert_eq!(titles, vec!["apple", "zebra"]);

        let all = repo
            .list_quizzes(&QuizFilter {
                include_drafts: true,
                category: None,
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn update_question_keeps_known_answer_ids() {
        let repo = InMemoryRepository::new();
        let quiz = repo.insert_quiz(quiz_record("q", "q")).await.unwrap();
        let stored = repo.insert_question(mc_question(quiz)).await.unwrap();
        let first = answer_ids(&stored)[0];

        let mut update = mc_question(quiz);
        if let QuestionKindDraft::MultipleChoice { answers, .. } = &mut update.kind {
            answers[0].id = Some(first);
        }
        let updated = repo.update_question(stored.id, update).await.unwrap();
        let ids = answer_ids(&updated);
        assert_eq!(ids[0], first);
        assert_ne!(ids[1], answer_ids(&stored)[1]);

        let mut bogus = mc_question(quiz);
        if let QuestionKindDraft::MultipleChoice { answers, .. } = &mut bogus.kind {
            answers[0].id = Some(AnswerId::new(999));
        }
        let err = repo.update_question(stored.id, bogus).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn set_quiz_questions_replaces_membership() {
        let repo = InMemoryRepository::new();
        let quiz = repo.insert_quiz(quiz_record("q", "q")).await.unwrap();
        let other = repo.insert_quiz(quiz_record("o", "o")).await.unwrap();
        let q1 = repo.insert_question(mc_question(quiz)).await.unwrap();
        let q2 = repo.insert_question(mc_question(other)).await.unwrap();

        repo.set_quiz_questions(quiz, &[q2.id]).await.unwrap();
        let ids: Vec<QuestionId> = repo
            .questions_for_quiz(quiz)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec![q2.id]);
        assert!(repo.get_question(q1.id).await.unwrap().quiz_ids.is_empty());
        assert_eq!(
            repo.get_question(q2.id).await.unwrap().quiz_ids,
            vec![quiz, other]
        );
    }

    #[tokio::test]
    async fn sitting_insert_creates_blank_answers_and_delete_cascades() {
        let repo = InMemoryRepository::new();
        let user = repo.insert_user(user_record("a@b.c")).await.unwrap();
        let quiz = repo.insert_quiz(quiz_record("q", "q")).await.unwrap();
        let q = repo.insert_question(mc_question(quiz)).await.unwrap();

        let new = NewSitting::new(user, quiz, SittingMode::Exam, vec![q.id], fixed_now()).unwrap();
        let id = repo.insert_sitting(new).await.unwrap();
        let answers = repo.list_user_answers(id).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_id, q.id);

        let open = repo
            .find_open_sitting(user, quiz, SittingMode::Exam)
            .await
            .unwrap();
        assert_eq!(open.map(|s| s.id()), Some(id));
        assert!(
            repo.find_open_sitting(user, quiz, SittingMode::Study)
                .await
                .unwrap()
                .is_none()
        );

        repo.delete_sitting(id).await.unwrap();
        assert!(repo.list_user_answers(id).await.unwrap().is_empty());
        assert!(matches!(
            repo.get_sitting(id).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn record_answer_checks_and_credits_once() {
        let repo = InMemoryRepository::new();
        let user = repo.insert_user(user_record("a@b.c")).await.unwrap();
        let quiz = repo.insert_quiz(quiz_record("q", "q")).await.unwrap();
        let q = repo.insert_question(mc_question(quiz)).await.unwrap();
        let new = NewSitting::new(user, quiz, SittingMode::Exam, vec![q.id], fixed_now()).unwrap();
        let id = repo.insert_sitting(new).await.unwrap();
        let history = CategoryName::normalize("history").unwrap();
        let record = AnswerRecord {
            sitting: id,
            order: 1,
            is_correct: true,
            answer: "1".into(),
            stored_correct: Some(true),
            category: Some(history.clone()),
        };

        let sitting = repo.record_answer(record.clone()).await.unwrap();
        assert_eq!(sitting.current_score(), 1);
        assert_eq!(repo.get_user_answer(id, 1).await.unwrap().answer.as_deref(), Some("1"));

        let err = repo.record_answer(record.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Sitting(SittingError::AlreadyAnswered(1))
        ));
        let err = repo
            .record_answer(AnswerRecord { order: 2, ..record })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Sitting(SittingError::UnknownOrder(2))));

        let progress = repo.get_progress(user).await.unwrap();
        assert_eq!(progress.score_for(&history).triple(), [1, 1, 100]);
    }

    #[tokio::test]
    async fn toggle_needs_a_completed_sitting() {
        let repo = InMemoryRepository::new();
        let user = repo.insert_user(user_record("a@b.c")).await.unwrap();
        let quiz = repo.insert_quiz(quiz_record("q", "q")).await.unwrap();
        let q = repo.insert_question(mc_question(quiz)).await.unwrap();
        let new = NewSitting::new(user, quiz, SittingMode::Exam, vec![q.id], fixed_now()).unwrap();
        let id = repo.insert_sitting(new).await.unwrap();

        let err = repo.toggle_mark(id, 1).await.unwrap_err();
        assert!(matches!(err, StorageError::Sitting(SittingError::NotComplete)));

        let first_end = fixed_now();
        repo.complete_sitting(id, first_end).await.unwrap();
        let again = repo
            .complete_sitting(id, first_end + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again.end(), Some(first_end));

        let toggled = repo.toggle_mark(id, 1).await.unwrap();
        assert_eq!(toggled.mark_at(1), Some(AnswerMark::Correct));
        assert_eq!(repo.get_user_answer(id, 1).await.unwrap().is_correct, Some(true));
        assert!(matches!(
            repo.toggle_mark(SittingId::new(99), 1).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn completed_sittings_filter_by_quiz_and_user() {
        let repo = InMemoryRepository::new();
        let ann = repo.insert_user(user_record("ann@x.org")).await.unwrap();
        let bob = repo.insert_user(user_record("bob@x.org")).await.unwrap();
        let quiz = repo.insert_quiz(quiz_record("Rivers", "r")).await.unwrap();
        let q = repo.insert_question(mc_question(quiz)).await.unwrap();

        for user in [ann, bob] {
            let new =
                NewSitting::new(user, quiz, SittingMode::Exam, vec![q.id], fixed_now()).unwrap();
            let id = repo.insert_sitting(new).await.unwrap();
            repo.complete_sitting(id, fixed_now()).await.unwrap();
        }

        let all = repo
            .list_completed_sittings(&SittingFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let only_bob = repo
            .list_completed_sittings(&SittingFilter {
                quiz_title_contains: Some("RIV".into()),
                user_contains: Some("Bob".into()),
            })
            .await
            .unwrap();
        assert_eq!(only_bob.len(), 1);
        assert_eq!(only_bob[0].user_id(), bob);

        let none = repo
            .list_completed_sittings(&SittingFilter {
                quiz_title_contains: Some("lakes".into()),
                user_contains: None,
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn missing_progress_is_empty() {
        let repo = InMemoryRepository::new();
        let progress = repo.get_progress(UserId::new(3)).await.unwrap();
        assert_eq!(progress.user_id(), UserId::new(3));
        assert!(progress.encode().is_empty());
    }
}
