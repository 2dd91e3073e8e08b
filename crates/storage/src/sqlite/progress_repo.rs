use quiz_core::model::{CategoryName, Progress, UserId};
use sqlx::SqliteConnection;

use super::SqliteRepository;
use super::mapping::{db, map_progress_row, to_i64};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(&self, user: UserId) -> Result<Progress, StorageError> {
        let row = sqlx::query("SELECT user_id, score FROM progress WHERE user_id = ?1")
            .bind(to_i64("user_id", user.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        match row {
            Some(row) => map_progress_row(&row),
            None => Ok(Progress::new(user)),
        }
    }
}

/// Add one attempt at `category` to the user's totals inside an open transaction.
pub(super) async fn credit_category(
    conn: &mut SqliteConnection,
    user: UserId,
    category: &CategoryName,
    is_correct: bool,
) -> Result<(), StorageError> {
    let row = sqlx::query("SELECT user_id, score FROM progress WHERE user_id = ?1")
        .bind(to_i64("user_id", user.value())?)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db)?;
    let mut progress = match row {
        Some(row) => map_progress_row(&row)?,
        None => Progress::new(user),
    };
    progress.update_score(category, i64::from(is_correct), 1);

    sqlx::query(
        r"
        INSERT INTO progress (user_id, score) VALUES (?1, ?2)
        ON CONFLICT(user_id) DO UPDATE SET score = excluded.score
        ",
    )
    .bind(to_i64("user_id", user.value())?)
    .bind(progress.encode())
    .execute(&mut *conn)
    .await
    .map_err(db)?;
    Ok(())
}
