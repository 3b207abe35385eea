/// API routes and handlers, served under `/api/v1`
pub mod accounts;
pub mod keycloak;
pub mod recipes;
pub mod sources;

use crate::context::AppContext;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/version", get(version))
        .merge(keycloak::routes())
        .merge(accounts::routes())
        .merge(recipes::routes())
        .merge(sources::routes())
}

async fn version() -> Json<Value> {
    Json(json!({
        "app": env!("CARGO_PKG_VERSION"),
        "api": "v1"
    }))
}
