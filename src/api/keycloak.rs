/// Keycloak login flow: redirect, callback, session token and logout
use crate::{
    account::AccountType,
    auth::token::{expired_session_cookie, session_cookie, token_from_jar, SessionToken},
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Build login flow routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/keycloak/login", get(login))
        .route("/oauth", get(oauth_callback))
        .route("/auth/keycloak/token", get(token))
        .route("/auth/keycloak/logout", get(logout))
}

#[derive(Debug, Deserialize)]
struct LoginParams {
    #[serde(default)]
    signup: bool,
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
}

fn found(location: &str) -> (StatusCode, [(header::HeaderName, String); 1]) {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())])
}

/// Post-login target: a same-origin path from the login request, else the app root
fn landing_page(return_to: &str, app_root: &str) -> String {
    let same_origin = return_to.starts_with('/')
        && !return_to.starts_with("//")
        && !return_to.contains('\\');

    if same_origin {
        return_to.to_string()
    } else {
        app_root.to_string()
    }
}

/// Issue a correlation state and send the browser to the identity provider
async fn login(
    State(ctx): State<AppContext>,
    Query(params): Query<LoginParams>,
) -> AppResult<Response> {
    let return_to = params
        .return_to
        .unwrap_or_else(|| ctx.config.service.app_root.clone());

    let state = ctx.state_store.create_state(&return_to, params.signup).await?;
    let url = ctx.identity_provider.authorization_url(&state.state)?;

    Ok(found(&url).into_response())
}

/// Provider callback: consume the state, exchange the code, start the session
async fn oauth_callback(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> AppResult<Response> {
    let state_token = params.state.ok_or(AppError::StateNotFound)?;
    let state = ctx
        .state_store
        .find_and_consume(&state_token)
        .await?
        .ok_or_else(|| {
            debug!("oauth_callback: unknown or already used state");
            AppError::StateNotFound
        })?;

    let code = params
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let token = ctx
        .identity_provider
        .exchange_code(&code)
        .await
        .map_err(|e| {
            tracing::error!("oauth_callback: code exchange failed: {}", e);
            e
        })?;

    let claims = ctx.identity_provider.verifier().claims(&token.token)?;

    if state.signup {
        match ctx
            .account_manager
            .create_account(&claims.email, AccountType::Keycloak)
            .await
        {
            Ok(account) => info!("oauth_callback: signed up account {}", account.id),
            Err(AppError::AccountAlreadyExists(_)) => {
                debug!("oauth_callback: signup for existing account")
            }
            Err(e) => warn!("oauth_callback: signup failed: {}", e),
        }
    }

    let account = ctx
        .account_manager
        .find_account(&claims.email, AccountType::Keycloak)
        .await?;
    debug!("oauth_callback: account {} logged in", account.id);

    let jar = jar.add(session_cookie(&token, &ctx.config.session));
    let location = landing_page(&state.return_to, &ctx.config.service.app_root);

    Ok((jar, found(&location)).into_response())
}

/// Return the session token after re-validating it
async fn token(State(ctx): State<AppContext>, jar: CookieJar) -> AppResult<Json<SessionToken>> {
    let not_logged_in = || AppError::NotFound("No valid session, please log in".to_string());

    let token = token_from_jar(&jar).ok_or_else(not_logged_in)?;

    let claims = ctx
        .identity_provider
        .verifier()
        .claims(&token.token)
        .map_err(|e| {
            debug!("token: session rejected: {}", e);
            not_logged_in()
        })?;

    match ctx
        .account_manager
        .find_account(&claims.email, AccountType::Keycloak)
        .await
    {
        Ok(_) => Ok(Json(token)),
        Err(AppError::AccountNotFound(_)) => Err(not_logged_in()),
        Err(e) => Err(e),
    }
}

/// Drop the session cookie
async fn logout(State(ctx): State<AppContext>, jar: CookieJar) -> (CookieJar, StatusCode) {
    (jar.add(expired_session_cookie(&ctx.config.session)), StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        server::build_router,
        test_utils::{sign_id_token, test_context, TEST_AUDIENCE},
    };
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn location(response: &Response) -> String {
        response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .to_string()
    }

    fn state_from(location: &str) -> String {
        location.split("state=").nth(1).unwrap().to_string()
    }

    fn session_cookie_pair(response: &Response) -> String {
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn login_state(app: &Router, query: &str) -> String {
        let response = get(app, &format!("/api/v1/auth/keycloak/login{}", query), None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        state_from(&location(&response))
    }

    #[tokio::test]
    async fn test_signup_flow_sets_session() {
        let app = build_router(test_context().await);

        let state = login_state(&app, "?signup=true&returnTo=/recipes").await;
        let response = get(
            &app,
            &format!("/api/v1/oauth?state={}&session_state=x&code=cook@example.com", state),
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/recipes");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("token="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age=3600"));
        assert!(set_cookie.contains("Path=/"));

        let cookie = session_cookie_pair(&response);
        let response = get(&app, "/api/v1/auth/keycloak/token", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let token: SessionToken = serde_json::from_slice(&body).unwrap();
        assert_eq!(format!("token={}", token.token), cookie);
    }

    #[tokio::test]
    async fn test_state_cannot_be_replayed() {
        let app = build_router(test_context().await);

        let state = login_state(&app, "?signup=true").await;
        let uri = format!("/api/v1/oauth?state={}&code=cook@example.com", state);

        assert_eq!(get(&app, &uri, None).await.status(), StatusCode::FOUND);
        assert_eq!(get(&app, &uri, None).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_state_is_not_found() {
        let app = build_router(test_context().await);

        let response = get(&app, "/api/v1/oauth?state=feedfacefeedface&code=x", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get(&app, "/api/v1/oauth?code=x", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_without_signup_requires_account() {
        let app = build_router(test_context().await);

        let state = login_state(&app, "").await;
        let response = get(
            &app,
            &format!("/api/v1/oauth?state={}&code=stranger@example.com", state),
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_login_of_existing_account_sets_session() {
        let ctx = test_context().await;
        ctx.account_manager
            .create_account("cook@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let app = build_router(ctx);

        let state = login_state(&app, "").await;
        let response = get(
            &app,
            &format!("/api/v1/oauth?state={}&code=cook@example.com", state),
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("token="));
        assert!(set_cookie.contains("HttpOnly"));

        let cookie = session_cookie_pair(&response);
        let response = get(&app, "/api/v1/auth/keycloak/token", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_repeated_signup_is_idempotent() {
        let ctx = test_context().await;
        let app = build_router(ctx.clone());

        for _ in 0..2 {
            let state = login_state(&app, "?signup=true").await;
            let response = get(
                &app,
                &format!("/api/v1/oauth?state={}&code=twice@example.com", state),
                None,
            )
            .await;
            assert_eq!(response.status(), StatusCode::FOUND);
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM account")
            .fetch_one(&ctx.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_and_claims() {
        let app = build_router(test_context().await);

        let state = login_state(&app, "?signup=true").await;
        let response = get(&app, &format!("/api/v1/oauth?state={}&code=fail", state), None).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let state = login_state(&app, "?signup=true").await;
        let response =
            get(&app, &format!("/api/v1/oauth?state={}&code=no-email", state), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_external_return_to_falls_back_to_app_root() {
        let app = build_router(test_context().await);

        let state = login_state(&app, "?signup=true&returnTo=https://evil.example.com").await;
        let response = get(
            &app,
            &format!("/api/v1/oauth?state={}&code=cook@example.com", state),
            None,
        )
        .await;

        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_token_requires_valid_session() {
        let app = build_router(test_context().await);

        let response = get(&app, "/api/v1/auth/keycloak/token", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get(&app, "/api/v1/auth/keycloak/token", Some("token=garbage")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_token_of_missing_account_is_not_found() {
        let ctx = test_context().await;
        let app = build_router(ctx.clone());

        let cookie = format!(
            "token={}",
            sign_id_token(Some("ghost@example.com"), TEST_AUDIENCE, 3600)
        );
        let response = get(&app, "/api/v1/auth/keycloak/token", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let account = ctx
            .account_manager
            .create_account("gone@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let cookie = format!(
            "token={}",
            sign_id_token(Some("gone@example.com"), TEST_AUDIENCE, 3600)
        );
        let response = get(&app, "/api/v1/auth/keycloak/token", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);

        ctx.account_manager
            .delete_account_by_id(&account.id)
            .await
            .unwrap();
        let response = get(&app, "/api/v1/auth/keycloak/token", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_token_is_not_found() {
        let ctx = test_context().await;
        ctx.account_manager
            .create_account("cook@example.com", AccountType::Keycloak)
            .await
            .unwrap();
        let app = build_router(ctx);

        let cookie = format!(
            "token={}",
            sign_id_token(Some("cook@example.com"), TEST_AUDIENCE, -3600)
        );
        let response = get(&app, "/api/v1/auth/keycloak/token", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_always_expires_cookie() {
        let app = build_router(test_context().await);

        let response = get(&app, "/api/v1/auth/keycloak/logout", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("token=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_landing_page() {
        assert_eq!(landing_page("/recipes/r/1", "/"), "/recipes/r/1");
        assert_eq!(landing_page("//evil.example.com", "/"), "/");
        assert_eq!(landing_page("https://evil.example.com", "/app"), "/app");
    }
}
