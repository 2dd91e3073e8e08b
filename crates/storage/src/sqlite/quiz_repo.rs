use quiz_core::model::{QuizDetails, Quiz, QuizId, QuizSlug};

use super::SqliteRepository;
use super::mapping::{db, map_quiz_row, ser, to_i64};
use crate::repository::{NewQuizRecord, QuizFilter, QuizRepository, StorageError};

const QUIZ_COLUMNS: &str = r"
    id, title, description, kind, url, category_id, random_order, max_questions,
    exam_paper, single_attempt, pass_mark, success_text, fail_text, draft,
    created_at, updated_at
";

fn category_i64(details: &QuizDetails) -> Result<Option<i64>, StorageError> {
    details
        .category_id
        .map(|c| to_i64("category_id", c.value()))
        .transpose()
}

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn insert_quiz(&self, quiz: NewQuizRecord) -> Result<QuizId, StorageError> {
        let d = &quiz.details;
        let res = sqlx::query(
            r"
            INSERT INTO quizzes (
                title, description, kind, url, category_id, random_order, max_questions,
                exam_paper, single_attempt, pass_mark, success_text, fail_text, draft,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            ",
        )
        .bind(d.title.as_str())
        .bind(d.description.as_str())
        .bind(d.kind.as_str())
        .bind(d.slug.as_str())
        .bind(category_i64(d)?)
        .bind(d.random_order)
        .bind(d.max_questions.map(i64::from))
        .bind(d.exam_paper)
        .bind(d.single_attempt)
        .bind(i64::from(d.pass_mark))
        .bind(d.success_text.as_str())
        .bind(d.fail_text.as_str())
        .bind(d.draft)
        .bind(quiz.created_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(QuizId::new(
            u64::try_from(res.last_insert_rowid()).map_err(ser)?,
        ))
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let d = quiz.details();
        let res = sqlx::query(
            r"
            UPDATE quizzes SET
                title = ?2,
                description = ?3,
                kind = ?4,
                url = ?5,
                category_id = ?6,
                random_order = ?7,
                max_questions = ?8,
                exam_paper = ?9,
                single_attempt = ?10,
                pass_mark = ?11,
                success_text = ?12,
                fail_text = ?13,
                draft = ?14,
                updated_at = ?15
            WHERE id = ?1
            ",
        )
        .bind(to_i64("quiz_id", quiz.id().value())?)
        .bind(d.title.as_str())
        .bind(d.description.as_str())
        .bind(d.kind.as_str())
        .bind(d.slug.as_str())
        .bind(category_i64(d)?)
        .bind(d.random_order)
        .bind(d.max_questions.map(i64::from))
        .bind(d.exam_paper)
        .bind(d.single_attempt)
        .bind(i64::from(d.pass_mark))
        .bind(d.success_text.as_str())
        .bind(d.fail_text.as_str())
        .bind(d.draft)
        .bind(quiz.updated_at())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(to_i64("quiz_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_quiz_row(&row)
    }

    async fn find_quiz_by_slug(&self, slug: &QuizSlug) -> Result<Option<Quiz>, StorageError> {
        let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE url = ?1");
        let row = sqlx::query(&sql)
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_quiz_row).transpose()
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StorageError> {
        let sql = format!(
            r"
            SELECT {QUIZ_COLUMNS} FROM quizzes
            WHERE (?1 OR draft = 0)
              AND (?2 IS NULL OR category_id = ?2)
            ORDER BY title ASC, id ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(filter.include_drafts)
            .bind(
                filter
                    .category
                    .map(|c| to_i64("category_id", c.value()))
                    .transpose()?,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(map_quiz_row).collect()
    }

    async fn delete_quiz(&self, id: QuizId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM quizzes WHERE id = ?1")
            .bind(to_i64("quiz_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
