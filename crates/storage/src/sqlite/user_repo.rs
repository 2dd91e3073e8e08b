use chrono::{DateTime, Utc};
use quiz_core::model::{Email, User, UserId};

use super::SqliteRepository;
use super::mapping::{db, map_user_row, to_i64};
use crate::repository::{NewUserRecord, StorageError, StoredUser, UserRepository};

const USER_COLUMNS: &str = r"
    u.id, u.email, u.password_hash, u.name, u.birthdate, u.gender, u.language,
    u.is_staff, u.is_superuser, u.can_edit_quizzes, u.can_view_sittings,
    u.is_active, u.created_at
";

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (
                email, password_hash, name, birthdate, gender, language,
                is_staff, is_superuser, can_edit_quizzes, can_view_sittings,
                is_active, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )
        .bind(user.email.as_str())
        .bind(user.password_hash)
        .bind(user.profile.name)
        .bind(user.profile.birthdate)
        .bind(user.profile.gender.as_str())
        .bind(user.profile.language.as_str())
        .bind(user.permissions.is_staff)
        .bind(user.permissions.is_superuser)
        .bind(user.permissions.can_edit_quizzes)
        .bind(user.permissions.can_view_sittings)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(UserId::new(
            u64::try_from(res.last_insert_rowid())
                .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))?,
        ))
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
        let row = sqlx::query(&sql)
            .bind(to_i64("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        Ok(map_user_row(&row)?.user)
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<StoredUser>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?1");
        let row = sqlx::query(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let profile = user.profile();
        let permissions = user.permissions();
        let res = sqlx::query(
            r"
            UPDATE users SET
                name = ?2,
                birthdate = ?3,
                gender = ?4,
                language = ?5,
                is_staff = ?6,
                is_superuser = ?7,
                can_edit_quizzes = ?8,
                can_view_sittings = ?9,
                is_active = ?10
            WHERE id = ?1
            ",
        )
        .bind(to_i64("user_id", user.id().value())?)
        .bind(profile.name.as_str())
        .bind(profile.birthdate)
        .bind(profile.gender.as_str())
        .bind(profile.language.as_str())
        .bind(permissions.is_staff)
        .bind(permissions.is_superuser)
        .bind(permissions.can_edit_quizzes)
        .bind(permissions.can_view_sittings)
        .bind(user.is_active())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn insert_token(
        &self,
        token_hash: &str,
        user: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO auth_tokens (token_hash, user_id, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(token_hash)
        .bind(to_i64("user_id", user.value())?)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>, StorageError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM auth_tokens t JOIN users u ON u.id = t.user_id \
             WHERE t.token_hash = ?1"
        );
        let row = sqlx::query(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.as_ref().map(map_user_row).transpose()?.map(|s| s.user))
    }

    async fn delete_token(&self, token_hash: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM auth_tokens WHERE token_hash = ?1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }
}
