use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, SubCategoryId};

const MAX_NAME_LEN: usize = 250;
const MAX_DESCRIPTION_LEN: usize = 150;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CategoryError {
    #[error("category name cannot be empty")]
    EmptyName,

    #[error("category name is longer than {MAX_NAME_LEN} characters")]
    NameTooLong,

    #[error("category description is longer than {MAX_DESCRIPTION_LEN} characters")]
    DescriptionTooLong,
}

//
// ─── NAME ──────────────────────────────────────────────────────────────────────
//

/// Normalized category name: whitespace runs become `-`, everything lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    /// Normalize a raw category name.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::EmptyName` if nothing is left after trimming,
    /// `CategoryError::NameTooLong` above 250 characters.
    pub fn normalize(raw: &str) -> Result<Self, CategoryError> {
        let joined = raw.split_whitespace().collect::<Vec<_>>().join("-");
        if joined.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        if joined.chars().count() > MAX_NAME_LEN {
            return Err(CategoryError::NameTooLong);
        }
        Ok(Self(joined.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: CategoryName,
    description: String,
}

impl Category {
    /// Build a category from a normalized name.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::DescriptionTooLong` above 150 characters.
    pub fn new(
        id: CategoryId,
        name: CategoryName,
        description: impl Into<String>,
    ) -> Result<Self, CategoryError> {
        let description = description.into().trim().to_string();
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(CategoryError::DescriptionTooLong);
        }
        Ok(Self {
            id,
            name,
            description,
        })
    }

    #[must_use]
    pub fn id(&self) -> CategoryId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &CategoryName {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Validated category input awaiting an id from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: CategoryName,
    pub description: String,
}

impl NewCategory {
    /// # Errors
    ///
    /// Returns `CategoryError` if the name or description is invalid.
    pub fn new(raw_name: &str, description: &str) -> Result<Self, CategoryError> {
        let name = CategoryName::normalize(raw_name)?;
        let description = description.trim().to_string();
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(CategoryError::DescriptionTooLong);
        }
        Ok(Self { name, description })
    }

    #[must_use]
    pub fn assign_id(self, id: CategoryId) -> Category {
        Category {
            id,
            name: self.name,
            description: self.description,
        }
    }
}

/// A finer grouping inside a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCategory {
    id: SubCategoryId,
    name: String,
    category_id: CategoryId,
}

impl SubCategory {
    /// # Errors
    ///
    /// Returns `CategoryError::EmptyName` / `CategoryError::NameTooLong`.
    pub fn new(
        id: SubCategoryId,
        name: impl Into<String>,
        category_id: CategoryId,
    ) -> Result<Self, CategoryError> {
        let name = Self::validate_name(&name.into())?;
        Ok(Self {
            id,
            name,
            category_id,
        })
    }

    /// Same rules as [`SubCategory::new`], before an id is known.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::EmptyName` / `CategoryError::NameTooLong`.
    pub fn validate_name(name: &str) -> Result<String, CategoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(CategoryError::NameTooLong);
        }
        Ok(name.to_string())
    }

    #[must_use]
    pub fn id(&self) -> SubCategoryId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    /// Label shown in listings, e.g. `Red (squishy-berries)`.
    #[must_use]
    pub fn label(&self, category: &Category) -> String {
        format!("{} ({})", self.name, category.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_collapses_whitespace_and_lowercases() {
        let name = CategoryName::normalize("squishy   berries").unwrap();
        assert_eq!(name.as_str(), "squishy-berries");

        let name = CategoryName::normalize("  Black\tBerries ").unwrap();
        assert_eq!(name.as_str(), "black-berries");
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            CategoryName::normalize("   ").unwrap_err(),
            CategoryError::EmptyName
        );
    }

    #[test]
    fn long_description_is_rejected() {
        let name = CategoryName::normalize("cheese").unwrap();
        let err = Category::new(CategoryId::new(1), name, "x".repeat(151)).unwrap_err();
        assert_eq!(err, CategoryError::DescriptionTooLong);
    }

    #[test]
    fn new_category_gets_its_id_from_storage() {
        let category = NewCategory::new("Squishy Berries", " soft ")
            .unwrap()
            .assign_id(CategoryId::new(4));
        assert_eq!(category.id(), CategoryId::new(4));
        assert_eq!(category.name().as_str(), "squishy-berries");
        assert_eq!(category.description(), "soft");
    }

    #[test]
    fn sub_category_label_includes_parent() {
        let parent = Category::new(
            CategoryId::new(1),
            CategoryName::normalize("squishy berries").unwrap(),
            "",
        )
        .unwrap();
        let sub = SubCategory::new(SubCategoryId::new(3), "Red", parent.id()).unwrap();
        assert_eq!(sub.category_id(), parent.id());
        assert_eq!(sub.label(&parent), "Red (squishy-berries)");
    }
}
