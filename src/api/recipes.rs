/// Recipe endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    recipes::{Recipe, RecipeId, RecipePicture},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Build recipe routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/num", get(count_recipes))
        .route("/recipes/rand", get(random_recipe))
        .route(
            "/recipes/r/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/r/:id/pictures", post(add_picture))
        .route("/recipes/r/:id/pictures/:name", get(get_picture))
}

#[derive(Debug, Deserialize)]
struct ServingsQuery {
    servings: Option<String>,
}

impl ServingsQuery {
    /// Requested servings; malformed values are ignored
    fn servings(&self) -> Option<u32> {
        let raw = self.servings.as_deref()?;
        match raw.parse::<u32>() {
            Ok(servings) if servings > 0 => Some(servings),
            _ => {
                warn!("Ignoring invalid servings value {:?}", raw);
                None
            }
        }
    }
}

fn scaled(mut recipe: Recipe, query: &ServingsQuery) -> AppResult<Recipe> {
    if let Some(servings) = query.servings() {
        recipe.scale_to(servings)?;
    }
    Ok(recipe)
}

async fn list_recipes(State(ctx): State<AppContext>) -> AppResult<Json<Vec<RecipeId>>> {
    Ok(Json(ctx.recipe_store.ids().await?))
}

async fn create_recipe(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(mut recipe): Json<Recipe>,
) -> AppResult<(StatusCode, Json<Recipe>)> {
    if recipe.name.trim().is_empty() {
        return Err(AppError::Validation("Recipe name is required".to_string()));
    }

    recipe.id = RecipeId::new();
    ctx.recipe_store.insert(&recipe, &[]).await?;

    info!("Recipe {} created by {}", recipe.id, auth.email);
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn count_recipes(State(ctx): State<AppContext>) -> AppResult<Json<Value>> {
    let num = ctx.recipe_store.num().await?;
    Ok(Json(json!({ "num": num })))
}

async fn random_recipe(
    State(ctx): State<AppContext>,
    Query(query): Query<ServingsQuery>,
) -> AppResult<Json<Recipe>> {
    let recipe = ctx.recipe_store.random().await?;
    Ok(Json(scaled(recipe, &query)?))
}

async fn get_recipe(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<ServingsQuery>,
) -> AppResult<Json<Recipe>> {
    let id = RecipeId::parse(&id)?;
    let recipe = ctx.recipe_store.get(&id).await?;
    Ok(Json(scaled(recipe, &query)?))
}

async fn update_recipe(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path(id): Path<String>,
    Json(mut recipe): Json<Recipe>,
) -> AppResult<StatusCode> {
    let id = RecipeId::parse(&id)?;
    recipe.id = id.clone();
    ctx.recipe_store.update(&id, &recipe).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_recipe(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = RecipeId::parse(&id)?;
    ctx.recipe_store.remove(&id).await?;

    info!("Recipe {} deleted by {}", id, auth.email);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct NewPicture {
    name: String,
    picture: String,
}

async fn add_picture(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<NewPicture>,
) -> AppResult<StatusCode> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Picture name is required".to_string()));
    }

    let picture = RecipePicture {
        id: RecipeId::parse(&id)?,
        name: body.name,
        picture: body.picture,
    };
    ctx.recipe_store.add_picture(&picture).await?;
    Ok(StatusCode::CREATED)
}

async fn get_picture(
    State(ctx): State<AppContext>,
    Path((id, name)): Path<(String, String)>,
) -> AppResult<Json<RecipePicture>> {
    let id = RecipeId::parse(&id)?;
    Ok(Json(ctx.recipe_store.picture(&id, &name).await?))
}
