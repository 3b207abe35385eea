/// Authentication: login states, identity tokens and request extractors

pub mod provider;
pub mod state;
pub mod token;

use crate::{
    account::{Account, AccountType},
    context::AppContext,
    error::AppError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;

/// Authenticated context - the session cookie re-validated on every request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub email: String,
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = token::token_from_jar(&jar)
            .ok_or_else(|| AppError::Authentication("Please log in first".to_string()))?;

        let claims = state
            .identity_provider
            .verifier()
            .claims(&token.token)?;

        let account = state
            .account_manager
            .find_account(&claims.email, AccountType::Keycloak)
            .await?;

        Ok(AuthContext {
            email: claims.email,
            account,
        })
    }
}

/// Admin authentication context - the verified email must be a configured admin
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = token::token_from_jar(&jar)
            .ok_or_else(|| AppError::Authentication("Please log in first".to_string()))?;

        let claims = state
            .identity_provider
            .verifier()
            .claims(&token.token)?;

        if !state.config.is_admin(&claims.email) {
            tracing::warn!("AdminAuthContext: {} is not an admin", claims.email);
            return Err(AppError::Authorization("Admin role required".to_string()));
        }

        Ok(AdminAuthContext {
            email: claims.email,
        })
    }
}
