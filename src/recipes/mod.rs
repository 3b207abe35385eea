/// Recipe model, serving scaling and persistence
mod store;

pub use store::RecipeStore;

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Recipe identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept only well-formed UUIDs
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value)
            .map(|uuid| Self(uuid.to_string()))
            .map_err(|_| AppError::Validation(format!("Invalid recipe id: {}", value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecipeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One ingredient line
///
/// `amount` is `None` when the line carries no quantity ("Flour").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: String,
}

fn default_servings() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub id: RecipeId,
    pub name: String,
    #[serde(rename = "components", default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "pictureLink", default)]
    pub picture_links: Vec<String>,
    #[serde(default = "default_servings")]
    pub servings: u32,
}

impl Recipe {
    pub fn new(id: RecipeId) -> Self {
        Self {
            id,
            name: String::new(),
            ingredients: Vec::new(),
            description: String::new(),
            picture_links: Vec::new(),
            servings: default_servings(),
        }
    }

    /// Multiply every defined, positive amount by `factor`
    pub fn scale_by(&mut self, factor: f64) {
        for ingredient in &mut self.ingredients {
            if let Some(amount) = ingredient.amount.as_mut() {
                if *amount > 0.0 {
                    *amount *= factor;
                }
            }
        }
    }

    /// Rescale amounts so the recipe yields `servings`
    pub fn scale_to(&mut self, servings: u32) -> AppResult<()> {
        if servings == 0 {
            return Err(AppError::Validation("Servings must be positive".to_string()));
        }
        if self.servings == 0 {
            return Err(AppError::Validation(format!(
                "Recipe {} has no servings to scale from",
                self.id
            )));
        }

        self.scale_by(f64::from(servings) / f64::from(self.servings));
        self.servings = servings;
        Ok(())
    }
}

/// Picture payload belonging to a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipePicture {
    pub id: RecipeId,
    pub name: String,
    /// `data:` URI with base64 payload, empty when the download failed
    pub picture: String,
}
