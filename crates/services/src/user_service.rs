use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use quiz_core::model::{Email, Gender, Language, Password, Permissions, Profile, User, UserId};
use storage::repository::{NewUserRecord, StorageError, UserRepository};

use crate::Clock;
use crate::credentials::{hash_password, new_token, token_digest, verify_password};
use crate::error::UserServiceError;

/// Partial profile change. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub language: Option<Language>,
}

/// Token returned by a successful login together with the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginSession {
    pub token: String,
    pub user: User,
}

/// Accounts, credentials and bearer tokens.
#[derive(Clone)]
pub struct UserService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Register a regular user.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::DuplicateEmail` when the address is taken.
    /// Returns `UserServiceError::User` for an invalid email, password or name.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, UserServiceError> {
        let profile = Profile {
            name: name.to_string(),
            ..Profile::default()
        };
        self.create(email, password, profile, Permissions::default())
            .await
    }

    /// Create an account with every permission.
    ///
    /// # Errors
    ///
    /// Same as [`UserService::register`].
    pub async fn create_superuser(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        self.create(email, password, Profile::default(), Permissions::superuser())
            .await
    }

    async fn create(
        &self,
        email: &str,
        password: &str,
        profile: Profile,
        permissions: Permissions,
    ) -> Result<User, UserServiceError> {
        let email = Email::parse(email)?;
        let password = Password::new(password)?;
        let profile = profile.validate()?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(UserServiceError::DuplicateEmail);
        }
        let password_hash = hash_password(password.expose().to_string()).await?;

        let id = self
            .users
            .insert_user(NewUserRecord {
                email,
                password_hash,
                profile,
                permissions,
                is_active: true,
                created_at: self.clock.now(),
            })
            .await
            .map_err(|e| match e {
                StorageError::Conflict => UserServiceError::DuplicateEmail,
                other => other.into(),
            })?;
        tracing::info!(user_id = %id, "user registered");

        Ok(self.users.get_user(id).await?)
    }

    /// Check credentials and issue a new bearer token.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::InvalidCredentials` for an unknown email or wrong password.
    /// Returns `UserServiceError::Inactive` for a disabled account.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginSession, UserServiceError> {
        let stored = match Email::parse(email) {
            Ok(email) => self.users.find_user_by_email(&email).await?,
            Err(_) => None,
        };
        let hash = stored.as_ref().map(|s| s.password_hash.clone());
        let verified = verify_password(hash, password.to_string()).await?;
        let Some(stored) = stored.filter(|_| verified) else {
            return Err(UserServiceError::InvalidCredentials);
        };
        if !stored.user.is_active() {
            return Err(UserServiceError::Inactive);
        }

        let token = new_token();
        self.users
            .insert_token(&token_digest(&token), stored.user.id(), self.clock.now())
            .await?;
        tracing::info!(user_id = %stored.user.id(), "user logged in");

        Ok(LoginSession {
            token,
            user: stored.user,
        })
    }

    /// Resolve a bearer token to an active user.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::InvalidToken` when the token is unknown or the user inactive.
    pub async fn authenticate(&self, token: &str) -> Result<User, UserServiceError> {
        let user = self
            .users
            .user_for_token(&token_digest(token))
            .await?
            .ok_or(UserServiceError::InvalidToken)?;
        if !user.is_active() {
            return Err(UserServiceError::InvalidToken);
        }
        Ok(user)
    }

    /// Forget a bearer token. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` if repository access fails.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.users.delete_token(&token_digest(token)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` (`NotFound`) for an unknown id.
    pub async fn profile(&self, id: UserId) -> Result<User, UserServiceError> {
        Ok(self.users.get_user(id).await?)
    }

    /// Apply a partial profile update.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::User` when the resulting profile is invalid.
    /// Returns `UserServiceError::Storage` if repository access fails.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, UserServiceError> {
        let mut user = self.users.get_user(id).await?;
        let mut profile = user.profile().clone();
        if let Some(name) = update.name {
            profile.name = name;
        }
        if update.birthdate.is_some() {
            profile.birthdate = update.birthdate;
        }
        if let Some(gender) = update.gender {
            profile.gender = gender;
        }
        if let Some(language) = update.language {
            profile.language = language;
        }
        user.set_profile(profile.validate()?);
        self.users.update_user(&user).await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::UserError;
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service() -> UserService {
        UserService::new(Clock::Fixed(fixed_now()), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn register_login_and_authenticate() {
        let users = service();
        let user = users
            .register("Ann@Example.COM", "password1", "Ann")
            .await
            .unwrap();
        assert_eq!(user.email().as_str(), "Ann@example.com");
        assert_eq!(user.created_at(), fixed_now());

        let session = users.login("Ann@example.com", "password1").await.unwrap();
        assert_eq!(session.user.id(), user.id());
        assert_eq!(users.authenticate(&session.token).await.unwrap(), user);

        users.logout(&session.token).await.unwrap();
        let err = users.authenticate(&session.token).await.unwrap_err();
        assert!(matches!(err, UserServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_short_passwords() {
        let users = service();
        users.register("a@b.io", "password1", "").await.unwrap();

        let err = users.register("a@B.IO", "password2", "").await.unwrap_err();
        assert!(matches!(err, UserServiceError::DuplicateEmail));

        let err = users.register("c@b.io", "short", "").await.unwrap_err();
        assert!(matches!(
            err,
            UserServiceError::User(UserError::PasswordTooShort)
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let users = service();
        users.register("a@b.io", "password1", "").await.unwrap();
        let err = users.login("a@b.io", "password2").await.unwrap_err();
        assert!(matches!(err, UserServiceError::InvalidCredentials));
        let err = users.login("nobody@b.io", "password1").await.unwrap_err();
        assert!(matches!(err, UserServiceError::InvalidCredentials));
        let err = users.login("not an email", "password1").await.unwrap_err();
        assert!(matches!(err, UserServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn stored_password_is_a_salted_pbkdf2_hash() {
        let repo = Arc::new(InMemoryRepository::new());
        let users = UserService::new(Clock::Fixed(fixed_now()), repo.clone());
        users.register("a@b.io", "password1", "").await.unwrap();

        let email = Email::parse("a@b.io").unwrap();
        let stored = repo.find_user_by_email(&email).await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("pbkdf2_sha256$"));
        assert!(!stored.password_hash.contains("password1"));
    }

    #[tokio::test]
    async fn superuser_has_every_permission() {
        let users = service();
        let admin = users
            .create_superuser("root@b.io", "password1")
            .await
            .unwrap();
        assert!(admin.permissions().has_edit_quizzes());
        assert!(admin.permissions().has_view_sittings());
    }

    #[tokio::test]
    async fn update_profile_keeps_unset_fields() {
        let users = service();
        let user = users.register("a@b.io", "password1", "Ann").await.unwrap();
        let updated = users
            .update_profile(
                user.id(),
                ProfileUpdate {
                    gender: Some(Gender::Female),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name(), "Ann");
        assert_eq!(updated.profile().gender, Gender::Female);
        assert_eq!(users.profile(user.id()).await.unwrap(), updated);
    }
}
