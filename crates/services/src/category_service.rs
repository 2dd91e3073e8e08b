use std::sync::Arc;

use quiz_core::model::{Category, CategoryId, CategoryName, NewCategory, SubCategory};
use storage::repository::{CategoryRepository, StorageError};

use crate::error::CategoryServiceError;

/// Category and sub-category management.
#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    #[must_use]
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    /// Normalize the name and persist a new category.
    ///
    /// # Errors
    ///
    /// Returns `CategoryServiceError::Category` for an invalid name or description.
    /// Returns `CategoryServiceError::DuplicateName` when the normalized name exists.
    pub async fn create_category(
        &self,
        raw_name: &str,
        description: &str,
    ) -> Result<Category, CategoryServiceError> {
        let new = NewCategory::new(raw_name, description)?;
        let name = new.name.to_string();
        self.categories
            .insert_category(new)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => CategoryServiceError::DuplicateName(name),
                other => other.into(),
            })
    }

    /// # Errors
    ///
    /// Returns `CategoryServiceError::Category` for an invalid name.
    /// Returns `CategoryServiceError::Storage` (`NotFound`) for an unknown category.
    pub async fn create_sub_category(
        &self,
        category: CategoryId,
        name: &str,
    ) -> Result<SubCategory, CategoryServiceError> {
        let name = SubCategory::validate_name(name)?;
        let sub = self.categories.insert_sub_category(&name, category).await?;
        Ok(sub)
    }

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `CategoryServiceError::Storage` if repository access fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.categories.list_categories().await?)
    }

    /// Look a category up by its raw or normalized name.
    ///
    /// # Errors
    ///
    /// Returns `CategoryServiceError::Category` when the name normalizes to nothing.
    /// Returns `CategoryServiceError::Storage` (`NotFound`) when no category matches.
    pub async fn get_by_name(&self, raw_name: &str) -> Result<Category, CategoryServiceError> {
        let name = CategoryName::normalize(raw_name)?;
        self.categories
            .find_category_by_name(&name)
            .await?
            .ok_or_else(|| StorageError::NotFound.into())
    }

    /// # Errors
    ///
    /// Returns `CategoryServiceError::Storage` if repository access fails.
    pub async fn list_sub_categories(
        &self,
        category: CategoryId,
    ) -> Result<Vec<SubCategory>, CategoryServiceError> {
        Ok(self.categories.list_sub_categories(category).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    fn service() -> CategoryService {
        CategoryService::new(Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn names_are_normalized_and_unique() {
        let categories = service();
        let created = categories
            .create_category("Squishy   Berries", "soft fruit")
            .await
            .unwrap();
        assert_eq!(created.name().as_str(), "squishy-berries");

        let err = categories
            .create_category("squishy berries", "")
            .await
            .unwrap_err();
        assert!(matches!(err, CategoryServiceError::DuplicateName(name) if name == "squishy-berries"));

        let found = categories.get_by_name("SQUISHY berries").await.unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let err = service().get_by_name("missing").await.unwrap_err();
        assert!(matches!(
            err,
            CategoryServiceError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn sub_categories_belong_to_their_category() {
        let categories = service();
        let fruit = categories.create_category("fruit", "").await.unwrap();
        let veg = categories.create_category("veg", "").await.unwrap();
        categories
            .create_sub_category(fruit.id(), "Berries")
            .await
            .unwrap();

        assert_eq!(
            categories.list_sub_categories(fruit.id()).await.unwrap().len(),
            1
        );
        assert!(
            categories
                .list_sub_categories(veg.id())
                .await
                .unwrap()
                .is_empty()
        );
        assert!(categories.create_sub_category(fruit.id(), "  ").await.is_err());
    }
}
