/// SQLite-backed recipe store
use super::{Ingredient, Recipe, RecipeId, RecipePicture};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

pub struct RecipeStore {
    db: SqlitePool,
}

impl RecipeStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a recipe together with its pictures in one transaction
    pub async fn insert(&self, recipe: &Recipe, pictures: &[RecipePicture]) -> AppResult<()> {
        let now = Utc::now();
        let ingredients = serde_json::to_string(&recipe.ingredients)?;
        let picture_links = serde_json::to_string(&recipe.picture_links)?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO recipe (id, name, description, servings, ingredients, picture_links, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(recipe.id.as_str())
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(recipe.servings)
        .bind(&ingredients)
        .bind(&picture_links)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for picture in pictures {
            sqlx::query(
                "INSERT OR REPLACE INTO recipe_picture (recipe_id, name, data) VALUES (?1, ?2, ?3)",
            )
            .bind(recipe.id.as_str())
            .bind(&picture.name)
            .bind(&picture.picture)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!("Stored recipe {} with {} pictures", recipe.id, pictures.len());
        Ok(())
    }

    /// Replace the stored fields of an existing recipe
    pub async fn update(&self, id: &RecipeId, recipe: &Recipe) -> AppResult<()> {
        let ingredients = serde_json::to_string(&recipe.ingredients)?;
        let picture_links = serde_json::to_string(&recipe.picture_links)?;

        let result = sqlx::query(
            "UPDATE recipe
             SET name = ?2, description = ?3, servings = ?4, ingredients = ?5,
                 picture_links = ?6, updated_at = ?7
             WHERE id = ?1",
        )
        .bind(id.as_str())
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(recipe.servings)
        .bind(&ingredients)
        .bind(&picture_links)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Recipe {}", id)));
        }
        Ok(())
    }

    pub async fn get(&self, id: &RecipeId) -> AppResult<Recipe> {
        let row = sqlx::query(
            "SELECT id, name, description, servings, ingredients, picture_links
             FROM recipe WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Recipe {}", id)))?;

        Self::row_to_recipe(&row)
    }

    /// Ids of all recipes, oldest first
    pub async fn ids(&self) -> AppResult<Vec<RecipeId>> {
        let rows = sqlx::query("SELECT id FROM recipe ORDER BY created_at, id")
            .fetch_all(&self.db)
            .await?;

        rows.iter()
            .map(|row| RecipeId::parse(&row.get::<String, _>("id")))
            .collect()
    }

    pub async fn num(&self) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipe")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// A uniformly chosen recipe
    pub async fn random(&self) -> AppResult<Recipe> {
        let row = sqlx::query(
            "SELECT id, name, description, servings, ingredients, picture_links
             FROM recipe ORDER BY RANDOM() LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No recipes stored".to_string()))?;

        Self::row_to_recipe(&row)
    }

    /// Delete a recipe and its pictures
    pub async fn remove(&self, id: &RecipeId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM recipe_picture WHERE recipe_id = ?1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM recipe WHERE id = ?1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Recipe {}", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn picture(&self, id: &RecipeId, name: &str) -> AppResult<RecipePicture> {
        let row = sqlx::query("SELECT data FROM recipe_picture WHERE recipe_id = ?1 AND name = ?2")
            .bind(id.as_str())
            .bind(name)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Picture {} of recipe {}", name, id)))?;

        Ok(RecipePicture {
            id: id.clone(),
            name: name.to_string(),
            picture: row.get("data"),
        })
    }

    /// Attach a picture to an existing recipe, listing it in `pictureLink`
    pub async fn add_picture(&self, picture: &RecipePicture) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let links: String = sqlx::query_scalar("SELECT picture_links FROM recipe WHERE id = ?1")
            .bind(picture.id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Recipe {}", picture.id)))?;
        let mut picture_links: Vec<String> = serde_json::from_str(&links)?;

        sqlx::query(
            "INSERT OR REPLACE INTO recipe_picture (recipe_id, name, data) VALUES (?1, ?2, ?3)",
        )
        .bind(picture.id.as_str())
        .bind(&picture.name)
        .bind(&picture.picture)
        .execute(&mut *tx)
        .await?;

        if !picture_links.contains(&picture.name) {
            picture_links.push(picture.name.clone());
            sqlx::query("UPDATE recipe SET picture_links = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(picture.id.as_str())
                .bind(serde_json::to_string(&picture_links)?)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn row_to_recipe(row: &SqliteRow) -> AppResult<Recipe> {
        let id: String = row.get("id");
        let ingredients: Vec<Ingredient> =
            serde_json::from_str(&row.get::<String, _>("ingredients"))?;
        let picture_links: Vec<String> =
            serde_json::from_str(&row.get::<String, _>("picture_links"))?;

        Ok(Recipe {
            id: RecipeId::parse(&id)?,
            name: row.get("name"),
            ingredients,
            description: row.get("description"),
            picture_links,
            servings: row.get("servings"),
        })
    }
}
