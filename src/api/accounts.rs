/// Account endpoints: current account and admin deletion
use crate::{
    account::{AccountView, DeleteAccountQuery},
    auth::{AdminAuthContext, AuthContext},
    context::AppContext,
    error::AppResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::info;

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/accounts/me", get(current_account))
        .route("/accounts", delete(delete_account_by_name))
        .route(
            "/accounts/:id",
            get(get_account).delete(delete_account_by_id),
        )
}

async fn current_account(auth: AuthContext) -> Json<AccountView> {
    Json(auth.account.into())
}

async fn get_account(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<AccountView>> {
    let account = ctx.account_manager.get_account(&id).await?;
    Ok(Json(account.into()))
}

async fn delete_account_by_id(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    ctx.account_manager.delete_account_by_id(&id).await?;
    info!("Account {} deleted by {}", id, admin.email);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_account_by_name(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Query(query): Query<DeleteAccountQuery>,
) -> AppResult<StatusCode> {
    ctx.account_manager.delete_account_by_name(&query.name).await?;
    info!("Account {} deleted by {}", query.name, admin.email);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        account::AccountType,
        server::build_router,
        test_utils::{sign_id_token, test_context, TEST_AUDIENCE},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn request(method: Method, uri: &str, email: &str) -> Request<Body> {
        let token = sign_id_token(Some(email), TEST_AUDIENCE, 3600);
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, format!("token={}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_current_account() {
        let ctx = test_context().await;
        let account = ctx
            .account_manager
            .create_account("cook@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let app = build_router(ctx);

        let response = app
            .oneshot(request(Method::GET, "/api/v1/accounts/me", "cook@example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["id"], account.id);
        assert_eq!(body["type"], "keycloak");
    }

    #[tokio::test]
    async fn test_admin_deletes_accounts() {
        let ctx = test_context().await;
        let first = ctx
            .account_manager
            .create_account("first@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        ctx.account_manager
            .create_account("second@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let app = build_router(ctx);

        let uri = format!("/api/v1/accounts/{}", first.id);
        let response = app
            .clone()
            .oneshot(request(Method::GET, &uri, "admin@example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, &uri, "admin@example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, &uri, "admin@example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(
                Method::DELETE,
                "/api/v1/accounts?name=second@example.com",
                "admin@example.com",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_non_admin_cannot_delete() {
        let ctx = test_context().await;
        let account = ctx
            .account_manager
            .create_account("cook@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let app = build_router(ctx);

        let response = app
            .clone()
            .oneshot(request(
                Method::DELETE,
                &format!("/api/v1/accounts/{}", account.id),
                "cook@example.com",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let anonymous = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/v1/accounts/{}", account.id))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(anonymous).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
