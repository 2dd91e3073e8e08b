use quiz_core::model::{Category, CategoryId, CategoryName, NewCategory, SubCategory, SubCategoryId};

use super::SqliteRepository;
use super::mapping::{db, map_category_row, map_sub_category_row, ser, to_i64};
use crate::repository::{CategoryRepository, StorageError};

#[async_trait::async_trait]
impl CategoryRepository for SqliteRepository {
    async fn insert_category(&self, category: NewCategory) -> Result<Category, StorageError> {
        let res = sqlx::query("INSERT INTO categories (name, description) VALUES (?1, ?2)")
            .bind(category.name.as_str())
            .bind(category.description.as_str())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(category.assign_id(CategoryId::new(id)))
    }

    async fn get_category(&self, id: CategoryId) -> Result<Category, StorageError> {
        let row = sqlx::query("SELECT id, name, description FROM categories WHERE id = ?1")
            .bind(to_i64("category_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_category_row(&row)
    }

    async fn find_category_by_name(
        &self,
        name: &CategoryName,
    ) -> Result<Option<Category>, StorageError> {
        let row = sqlx::query("SELECT id, name, description FROM categories WHERE name = ?1")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_category_row).transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let rows = sqlx::query("SELECT id, name, description FROM categories ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(map_category_row).collect()
    }

    async fn insert_sub_category(
        &self,
        name: &str,
        category: CategoryId,
    ) -> Result<SubCategory, StorageError> {
        let name = SubCategory::validate_name(name).map_err(ser)?;
        let res = sqlx::query("INSERT INTO sub_categories (name, category_id) VALUES (?1, ?2)")
            .bind(name.as_str())
            .bind(to_i64("category_id", category.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        SubCategory::new(SubCategoryId::new(id), name, category).map_err(ser)
    }

    async fn list_sub_categories(
        &self,
        category: CategoryId,
    ) -> Result<Vec<SubCategory>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, name, category_id FROM sub_categories WHERE category_id = ?1 ORDER BY id",
        )
        .bind(to_i64("category_id", category.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_sub_category_row).collect()
    }
}
