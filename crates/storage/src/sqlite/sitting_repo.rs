use chrono::{DateTime, Utc};
use quiz_core::model::sitting::{encode_marks, encode_question_order};
use quiz_core::model::{
    AnswerMark, NewSitting, QuizId, Sitting, SittingId, SittingMode, UserAnswer, UserId,
};
use sqlx::SqliteConnection;

use super::SqliteRepository;
use super::mapping::{db, map_sitting_row, map_user_answer_row, ser, to_i64};
use super::progress_repo::credit_category;
use crate::repository::{AnswerRecord, SittingFilter, SittingRepository, StorageError};

const SITTING_COLUMNS: &str = r"
    s.id, s.user_id, s.quiz_id, s.mode, s.question_order, s.current_score, s.complete,
    s.marks, s.started_at, s.ended_at
";

#[async_trait::async_trait]
impl SittingRepository for SqliteRepository {
    async fn insert_sitting(&self, new: NewSitting) -> Result<SittingId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query(
            r"
            INSERT INTO sittings (
                user_id, quiz_id, mode, question_order, current_score, complete, marks, started_at
            )
            VALUES (?1, ?2, ?3, ?4, 0, 0, '{}', ?5)
            ",
        )
        .bind(to_i64("user_id", new.user_id.value())?)
        .bind(to_i64("quiz_id", new.quiz_id.value())?)
        .bind(new.mode.as_str())
        .bind(encode_question_order(&new.question_order))
        .bind(new.start)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        let id = SittingId::new(u64::try_from(res.last_insert_rowid()).map_err(ser)?);

        let stored = new.assign_id(id);
        sqlx::query("UPDATE sittings SET marks = ?2 WHERE id = ?1")
            .bind(to_i64("sitting_id", id.value())?)
            .bind(encode_marks(stored.marks()))
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for answer in UserAnswer::blanks_for(&stored) {
            sqlx::query(
                r"
                INSERT INTO user_answers (sitting_id, position, user_id, question_id)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(to_i64("sitting_id", id.value())?)
            .bind(i64::from(answer.order))
            .bind(to_i64("user_id", answer.user_id.value())?)
            .bind(to_i64("question_id", answer.question_id.value())?)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(id)
    }

    async fn record_answer(&self, record: AnswerRecord) -> Result<Sitting, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut sitting = lock_sitting(&mut tx, record.sitting).await?;
        sitting.record_answer(record.order, record.is_correct)?;
        write_sitting(&mut tx, &sitting).await?;

        let res = sqlx::query(
            r"
            UPDATE user_answers SET answer = ?3, is_correct = ?4
            WHERE sitting_id = ?1 AND position = ?2
            ",
        )
        .bind(to_i64("sitting_id", record.sitting.value())?)
        .bind(i64::from(record.order))
        .bind(record.answer.as_str())
        .bind(record.stored_correct)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        if let Some(category) = &record.category {
            credit_category(&mut tx, sitting.user_id(), category, record.is_correct).await?;
        }
        tx.commit().await.map_err(db)?;
        Ok(sitting)
    }

    async fn toggle_mark(&self, id: SittingId, order: u32) -> Result<Sitting, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut sitting = lock_sitting(&mut tx, id).await?;
        let mark = sitting.toggle_mark(order)?;
        write_sitting(&mut tx, &sitting).await?;

        sqlx::query("UPDATE user_answers SET is_correct = ?3 WHERE sitting_id = ?1 AND position = ?2")
            .bind(to_i64("sitting_id", id.value())?)
            .bind(i64::from(order))
            .bind(mark == AnswerMark::Correct)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        tx.commit().await.map_err(db)?;
        Ok(sitting)
    }

    async fn complete_sitting(
        &self,
        id: SittingId,
        end: DateTime<Utc>,
    ) -> Result<Sitting, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut sitting = lock_sitting(&mut tx, id).await?;
        sitting.mark_complete(end);
        write_sitting(&mut tx, &sitting).await?;
        tx.commit().await.map_err(db)?;
        Ok(sitting)
    }

    async fn get_sitting(&self, id: SittingId) -> Result<Sitting, StorageError> {
        let sql = format!("SELECT {SITTING_COLUMNS} FROM sittings s WHERE s.id = ?1");
        let row = sqlx::query(&sql)
            .bind(to_i64("sitting_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_sitting_row(&row)
    }

    async fn find_open_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<Option<Sitting>, StorageError> {
        let sql = format!(
            r"
            SELECT {SITTING_COLUMNS} FROM sittings s
            WHERE s.user_id = ?1 AND s.quiz_id = ?2 AND s.mode = ?3 AND s.complete = 0
            ORDER BY s.id ASC
            LIMIT 1
            "
        );
        let row = sqlx::query(&sql)
            .bind(to_i64("user_id", user.value())?)
            .bind(to_i64("quiz_id", quiz.value())?)
            .bind(mode.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_sitting_row).transpose()
    }

    async fn has_completed_sitting(
        &self,
        user: UserId,
        quiz: QuizId,
        mode: SittingMode,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            r"
            SELECT 1 FROM sittings
            WHERE user_id = ?1 AND quiz_id = ?2 AND mode = ?3 AND complete = 1
            LIMIT 1
            ",
        )
        .bind(to_i64("user_id", user.value())?)
        .bind(to_i64("quiz_id", quiz.value())?)
        .bind(mode.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.is_some())
    }

    async fn list_user_sittings(&self, user: UserId) -> Result<Vec<Sitting>, StorageError> {
        let sql = format!(
            "SELECT {SITTING_COLUMNS} FROM sittings s WHERE s.user_id = ?1 ORDER BY s.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(to_i64("user_id", user.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(map_sitting_row).collect()
    }

    async fn list_completed_sittings(
        &self,
        filter: &SittingFilter,
    ) -> Result<Vec<Sitting>, StorageError> {
        let sql = format!(
            r"
            SELECT {SITTING_COLUMNS}
            FROM sittings s
            JOIN quizzes q ON q.id = s.quiz_id
            JOIN users u ON u.id = s.user_id
            WHERE s.complete = 1
              AND (?1 IS NULL OR instr(lower(q.title), lower(?1)) > 0)
              AND (?2 IS NULL
                   OR instr(lower(u.email), lower(?2)) > 0
                   OR instr(lower(u.name), lower(?2)) > 0)
            ORDER BY s.ended_at DESC, s.id DESC
            "
        );
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
        let rows = sqlx::query(&sql)
            .bind(non_empty(&filter.quiz_title_contains))
            .bind(non_empty(&filter.user_contains))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(map_sitting_row).collect()
    }

    async fn delete_sitting(&self, id: SittingId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM sittings WHERE id = ?1")
            .bind(to_i64("sitting_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_user_answer(
        &self,
        sitting: SittingId,
        order: u32,
    ) -> Result<UserAnswer, StorageError> {
        let row = sqlx::query(
            r"
            SELECT sitting_id, position, user_id, question_id, answer, is_correct
            FROM user_answers
            WHERE sitting_id = ?1 AND position = ?2
            ",
        )
        .bind(to_i64("sitting_id", sitting.value())?)
        .bind(i64::from(order))
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .ok_or(StorageError::NotFound)?;
        map_user_answer_row(&row)
    }

    async fn list_user_answers(
        &self,
        sitting: SittingId,
    ) -> Result<Vec<UserAnswer>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT sitting_id, position, user_id, question_id, answer, is_correct
            FROM user_answers
            WHERE sitting_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(to_i64("sitting_id", sitting.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_user_answer_row).collect()
    }
}

/// Load a sitting after taking the database write lock, so writers to the
/// same sitting run one after another instead of racing on stale marks.
async fn lock_sitting(conn: &mut SqliteConnection, id: SittingId) -> Result<Sitting, StorageError> {
    let res = sqlx::query("UPDATE sittings SET complete = complete WHERE id = ?1")
        .bind(to_i64("sitting_id", id.value())?)
        .execute(&mut *conn)
        .await
        .map_err(db)?;
    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    let sql = format!("SELECT {SITTING_COLUMNS} FROM sittings s WHERE s.id = ?1");
    let row = sqlx::query(&sql)
        .bind(to_i64("sitting_id", id.value())?)
        .fetch_one(&mut *conn)
        .await
        .map_err(db)?;
    map_sitting_row(&row)
}

async fn write_sitting(conn: &mut SqliteConnection, sitting: &Sitting) -> Result<(), StorageError> {
    sqlx::query(
        r"
        UPDATE sittings SET
            current_score = ?2,
            complete = ?3,
            marks = ?4,
            ended_at = ?5
        WHERE id = ?1
        ",
    )
    .bind(to_i64("sitting_id", sitting.id().value())?)
    .bind(sitting.current_score())
    .bind(sitting.is_complete())
    .bind(encode_marks(sitting.marks()))
    .bind(sitting.end())
    .execute(&mut *conn)
    .await
    .map_err(db)?;
    Ok(())
}
