/// Recipe source endpoints
use crate::{auth::AuthContext, context::AppContext, error::AppResult, recipes::Recipe};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

/// Drive exports with inline styles get large
const IMPORT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Build source routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/sources/drive/import", post(import_drive_document))
        .layer(DefaultBodyLimit::max(IMPORT_BODY_LIMIT))
}

/// Import one HTML document exported from Google Drive
async fn import_drive_document(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Recipe>)> {
    tracing::info!("Drive import requested by {}", auth.email);

    let recipe = ctx.importer.import_html(&body).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[cfg(test)]
mod tests {
    use crate::{
        account::AccountType,
        server::build_router,
        test_utils::{sign_id_token, test_context, DEFAULT_RECIPE_HTML, TEST_AUDIENCE},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn import_request(html: &[u8]) -> Request<Body> {
        let token = sign_id_token(Some("cook@example.com"), TEST_AUDIENCE, 3600);
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/sources/drive/import")
            .header(header::COOKIE, format!("token={}", token))
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from(html.to_vec()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_import_drive_document() {
        let ctx = test_context().await;
        ctx.account_manager
            .create_account("cook@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let app = build_router(ctx.clone());

        let response = app
            .clone()
            .oneshot(import_request(DEFAULT_RECIPE_HTML.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let recipe: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(recipe["name"], "TestRecipe");
        assert_eq!(recipe["pictureLink"][0], "IMG_20141227_132212.jpg");
        assert_eq!(ctx.recipe_store.num().await.unwrap(), 1);

        let response = app.oneshot(import_request(b"<html>")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_import_latin1_export() {
        let ctx = test_context().await;
        ctx.account_manager
            .create_account("cook@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let app = build_router(ctx.clone());

        let html = b"<p>K\xE4sekuchen</p><p>Zutaten</p><p>500g Quark</p><p>Zubereitung</p><p>Backen.</p>";
        let response = app.oneshot(import_request(html)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let recipe: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(recipe["name"], "K\u{FFFD}sekuchen");
        assert_eq!(recipe["description"], "Backen.");
        assert_eq!(ctx.recipe_store.num().await.unwrap(), 1);
    }
}
