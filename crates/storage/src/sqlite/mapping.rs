use chrono::{DateTime, NaiveDate, Utc};
use quiz_core::model::{
    Category, CategoryId, CategoryName, Email, Gender, Language, Permissions, Profile, Progress,
    QuestionId, Quiz, QuizDraft, QuizId, QuizKind, Sitting, SittingId, SittingMode,
    SubCategory, SubCategoryId, User, UserAnswer, UserId, sitting,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, StoredUser};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, recognizing constraint violations.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::RowNotFound = e {
        return StorageError::NotFound;
    }
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn get_u64(row: &SqliteRow, column: &'static str) -> Result<u64, StorageError> {
    to_u64(column, row.try_get::<i64, _>(column).map_err(ser)?)
}

fn get_opt_u64(row: &SqliteRow, column: &'static str) -> Result<Option<u64>, StorageError> {
    row.try_get::<Option<i64>, _>(column)
        .map_err(ser)?
        .map(|v| to_u64(column, v))
        .transpose()
}

pub(crate) fn get_u32(row: &SqliteRow, column: &'static str) -> Result<u32, StorageError> {
    let v: i64 = row.try_get(column).map_err(ser)?;
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {column}: {v}")))
}

pub(crate) fn get_bool(row: &SqliteRow, column: &'static str) -> Result<bool, StorageError> {
    Ok(row.try_get::<i64, _>(column).map_err(ser)? != 0)
}

pub(crate) fn user_id(row: &SqliteRow, column: &'static str) -> Result<UserId, StorageError> {
    Ok(UserId::new(get_u64(row, column)?))
}

pub(crate) fn quiz_id(row: &SqliteRow, column: &'static str) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(get_u64(row, column)?))
}

pub(crate) fn question_id(
    row: &SqliteRow,
    column: &'static str,
) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(get_u64(row, column)?))
}

pub(crate) fn category_id(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<CategoryId>, StorageError> {
    Ok(get_opt_u64(row, column)?.map(CategoryId::new))
}

pub(crate) fn sub_category_id(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<SubCategoryId>, StorageError> {
    Ok(get_opt_u64(row, column)?.map(SubCategoryId::new))
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<StoredUser, StorageError> {
    let email = Email::parse(&row.try_get::<String, _>("email").map_err(ser)?).map_err(ser)?;
    let gender = Gender::parse(&row.try_get::<String, _>("gender").map_err(ser)?).map_err(ser)?;
    let language =
        Language::parse(&row.try_get::<String, _>("language").map_err(ser)?).map_err(ser)?;
    let birthdate: Option<NaiveDate> = row.try_get("birthdate").map_err(ser)?;
    let profile = Profile {
        name: row.try_get("name").map_err(ser)?,
        birthdate,
        gender,
        language,
    };
    let permissions = Permissions {
        is_staff: get_bool(row, "is_staff")?,
        is_superuser: get_bool(row, "is_superuser")?,
        can_edit_quizzes: get_bool(row, "can_edit_quizzes")?,
        can_view_sittings: get_bool(row, "can_view_sittings")?,
    };
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
    Ok(StoredUser {
        user: User::new(
            user_id(row, "id")?,
            email,
            profile,
            permissions,
            get_bool(row, "is_active")?,
            created_at,
        ),
        password_hash: row.try_get("password_hash").map_err(ser)?,
    })
}

pub(crate) fn map_category_row(row: &SqliteRow) -> Result<Category, StorageError> {
    let name = CategoryName::normalize(&row.try_get::<String, _>("name").map_err(ser)?)
        .map_err(ser)?;
    Category::new(
        CategoryId::new(get_u64(row, "id")?),
        name,
        row.try_get::<String, _>("description").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_sub_category_row(row: &SqliteRow) -> Result<SubCategory, StorageError> {
    SubCategory::new(
        SubCategoryId::new(get_u64(row, "id")?),
        row.try_get::<String, _>("name").map_err(ser)?,
        CategoryId::new(get_u64(row, "category_id")?),
    )
    .map_err(ser)
}

pub(crate) fn map_quiz_row(row: &SqliteRow) -> Result<Quiz, StorageError> {
    let kind = QuizKind::parse(&row.try_get::<String, _>("kind").map_err(ser)?).map_err(ser)?;
    let pass_mark = u16::try_from(get_u32(row, "pass_mark")?).map_err(ser)?;
    let draft = QuizDraft {
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        kind,
        url: row.try_get("url").map_err(ser)?,
        category_id: category_id(row, "category_id")?,
        random_order: get_bool(row, "random_order")?,
        max_questions: row
            .try_get::<Option<i64>, _>("max_questions")
            .map_err(ser)?
            .map(u32::try_from)
            .transpose()
            .map_err(ser)?,
        exam_paper: get_bool(row, "exam_paper")?,
        single_attempt: get_bool(row, "single_attempt")?,
        pass_mark,
        success_text: row.try_get("success_text").map_err(ser)?,
        fail_text: row.try_get("fail_text").map_err(ser)?,
        draft: get_bool(row, "draft")?,
    };
    Quiz::from_persisted(
        quiz_id(row, "id")?,
        draft,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_sitting_row(row: &SqliteRow) -> Result<Sitting, StorageError> {
    let mode = SittingMode::parse(&row.try_get::<String, _>("mode").map_err(ser)?).map_err(ser)?;
    let order =
        sitting::decode_question_order(&row.try_get::<String, _>("question_order").map_err(ser)?)
            .map_err(ser)?;
    let marks = sitting::decode_marks(&row.try_get::<String, _>("marks").map_err(ser)?)
        .map_err(ser)?;
    Sitting::from_persisted(
        SittingId::new(get_u64(row, "id")?),
        user_id(row, "user_id")?,
        quiz_id(row, "quiz_id")?,
        mode,
        order,
        row.try_get("current_score").map_err(ser)?,
        get_bool(row, "complete")?,
        marks,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("ended_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_user_answer_row(row: &SqliteRow) -> Result<UserAnswer, StorageError> {
    Ok(UserAnswer {
        sitting_id: SittingId::new(get_u64(row, "sitting_id")?),
        user_id: user_id(row, "user_id")?,
        order: get_u32(row, "position")?,
        question_id: question_id(row, "question_id")?,
        answer: row.try_get("answer").map_err(ser)?,
        is_correct: row
            .try_get::<Option<i64>, _>("is_correct")
            .map_err(ser)?
            .map(|v| v != 0),
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<Progress, StorageError> {
    Progress::from_persisted(
        user_id(row, "user_id")?,
        &row.try_get::<String, _>("score").map_err(ser)?,
    )
    .map_err(ser)
}
