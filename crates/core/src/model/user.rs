use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

const MAX_NAME_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("name is longer than {MAX_NAME_LEN} characters")]
    NameTooLong,

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,

    #[error("unknown gender: {0}")]
    UnknownGender(String),

    #[error("unsupported language: {0}")]
    UnknownLanguage(String),
}

//
// ─── EMAIL ─────────────────────────────────────────────────────────────────────
//

/// Email address; the domain part is stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// # Errors
    ///
    /// Returns `UserError::InvalidEmail` unless the input has exactly one `@`
    /// between a non-empty local part and a non-empty domain.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        let trimmed = raw.trim();
        let invalid = || UserError::InvalidEmail(trimmed.to_string());
        let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(invalid());
        }
        Ok(Self(format!("{local}@{}", domain.to_lowercase())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = UserError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── PROFILE CHOICES ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Wontsay,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Wontsay => "wontsay",
        }
    }

    /// # Errors
    ///
    /// Returns `UserError::UnknownGender` for unrecognized values.
    pub fn parse(value: &str) -> Result<Self, UserError> {
        match value {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            "wontsay" => Ok(Self::Wontsay),
            other => Err(UserError::UnknownGender(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-us")]
    EnUs,
}

impl Language {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Language::EnUs => "en-us",
        }
    }

    /// # Errors
    ///
    /// Returns `UserError::UnknownLanguage` for anything but `en-us`.
    pub fn parse(value: &str) -> Result<Self, UserError> {
        match value {
            "en-us" => Ok(Self::EnUs),
            other => Err(UserError::UnknownLanguage(other.to_string())),
        }
    }
}

/// Staff flags. Superusers implicitly hold every permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub is_staff: bool,
    pub is_superuser: bool,
    pub can_edit_quizzes: bool,
    pub can_view_sittings: bool,
}

impl Permissions {
    #[must_use]
    pub fn superuser() -> Self {
        Self {
            is_staff: true,
            is_superuser: true,
            can_edit_quizzes: true,
            can_view_sittings: true,
        }
    }

    #[must_use]
    pub fn has_edit_quizzes(&self) -> bool {
        self.is_superuser || self.can_edit_quizzes
    }

    #[must_use]
    pub fn has_view_sittings(&self) -> bool {
        self.is_superuser || self.can_view_sittings
    }
}

//
// ─── PROFILE & USER ────────────────────────────────────────────────────────────
//

/// The user-editable part of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub birthdate: Option<NaiveDate>,
    pub gender: Gender,
    pub language: Language,
}

impl Profile {
    /// # Errors
    ///
    /// Returns `UserError::NameTooLong` above 255 characters.
    pub fn validate(mut self) -> Result<Self, UserError> {
        self.name = self.name.trim().to_string();
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(UserError::NameTooLong);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    email: Email,
    profile: Profile,
    permissions: Permissions,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(
        id: UserId,
        email: Email,
        profile: Profile,
        permissions: Permissions,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            profile,
            permissions,
            is_active,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Name when set, otherwise the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.profile.name.is_empty() {
            self.email.as_str()
        } else {
            &self.profile.name
        }
    }

    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = profile;
    }

    pub fn set_permissions(&mut self, permissions: Permissions) {
        self.permissions = permissions;
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

/// A plaintext password that satisfies the length rule.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// # Errors
    ///
    /// Returns `UserError::PasswordTooShort` below 8 characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, UserError> {
        let raw = raw.into();
        if raw.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::PasswordTooShort);
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}
