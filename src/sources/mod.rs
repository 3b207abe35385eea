/// Recipe sources
///
/// Imports documents from external sources into the recipe store.

pub mod drive_parser;
pub mod images;

use crate::{
    error::AppResult,
    recipes::{Recipe, RecipeId, RecipePicture, RecipeStore},
};
use drive_parser::DriveRecipeParser;
use std::sync::Arc;
use tracing::info;

/// Parses exported documents and persists the resulting recipes
pub struct SourceImporter {
    parser: DriveRecipeParser,
    store: Arc<RecipeStore>,
}

impl SourceImporter {
    pub fn new(parser: DriveRecipeParser, store: Arc<RecipeStore>) -> Self {
        Self { parser, store }
    }

    /// Import one Drive HTML export under a fresh recipe id
    pub async fn import_html(&self, html: &[u8]) -> AppResult<Recipe> {
        let (recipe, pictures) = self.parser.parse_recipe(html, RecipeId::new()).await?;

        let mut pictures: Vec<RecipePicture> = pictures.into_values().collect();
        pictures.sort_by(|a, b| a.name.cmp(&b.name));

        self.store.insert(&recipe, &pictures).await?;

        info!(
            "Imported recipe {} ({}) with {} pictures",
            recipe.name,
            recipe.id,
            pictures.len()
        );

        Ok(recipe)
    }
}
