/// OpenID Connect identity provider client
use crate::{
    auth::token::{IdTokenVerifier, SessionToken},
    config::KeycloakConfig,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use oauth2::{
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, ExtraTokenFields, RedirectUrl, Scope, StandardRevocableToken,
    StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Operations the login flow needs from the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to, embedding the correlation state
    fn authorization_url(&self, state: &str) -> AppResult<String>;

    /// Exchange an authorization code for the raw identity token
    async fn exchange_code(&self, code: &str) -> AppResult<SessionToken>;

    /// Verifier bound to this provider's keys, issuer and client id
    fn verifier(&self) -> &IdTokenVerifier;
}

/// Subset of the OpenID discovery document
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// OpenID Connect additions to the OAuth2 token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

pub type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// Authorization-code client with auth and token endpoints configured
pub type KeycloakClient = Client<
    BasicErrorResponse,
    OidcTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Keycloak realm reached through OpenID discovery
pub struct KeycloakProvider {
    http: reqwest::Client,
    oauth: KeycloakClient,
    verifier: IdTokenVerifier,
}

impl KeycloakProvider {
    /// Fetch the discovery document and signing keys once at startup
    pub async fn discover(config: &KeycloakConfig, timeout: Duration) -> AppResult<Self> {
        // Following redirects from the token endpoint opens the client up to SSRF
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            config.address.trim_end_matches('/')
        );
        let metadata: ProviderMetadata = fetch_json(&http, &discovery_url).await?;
        let jwks: JwkSet = fetch_json(&http, &metadata.jwks_uri).await?;

        let verifier = IdTokenVerifier::from_jwks(&metadata.issuer, &config.client_id, &jwks)?;
        let oauth = oauth_client(&metadata, config)?;

        info!(
            "Discovered identity provider {} ({} signing keys)",
            metadata.issuer,
            jwks.keys.len()
        );

        Ok(Self {
            http,
            oauth,
            verifier,
        })
    }
}

/// OAuth2 client for the discovered endpoints and the configured credentials
pub fn oauth_client(
    metadata: &ProviderMetadata,
    config: &KeycloakConfig,
) -> AppResult<KeycloakClient> {
    let invalid = |what: &str, e: oauth2::url::ParseError| {
        AppError::IdentityProvider(format!("Invalid {}: {}", what, e))
    };

    let auth_url = AuthUrl::new(metadata.authorization_endpoint.clone())
        .map_err(|e| invalid("authorization endpoint", e))?;
    let token_url =
        TokenUrl::new(metadata.token_endpoint.clone()).map_err(|e| invalid("token endpoint", e))?;
    let redirect_url =
        RedirectUrl::new(config.redirect_uri()).map_err(|e| invalid("redirect URI", e))?;

    Ok(Client::new(ClientId::new(config.client_id.clone()))
        .set_client_secret(ClientSecret::new(config.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url))
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> AppResult<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::IdentityProvider(format!("GET {} failed: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(AppError::IdentityProvider(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::IdentityProvider(format!("Invalid response from {}: {}", url, e)))
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    fn authorization_url(&self, state: &str) -> AppResult<String> {
        let (url, _csrf_token) = self
            .oauth
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .url();

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> AppResult<SessionToken> {
        let response = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Token exchange failed: {}", e)))?;

        response
            .extra_fields()
            .id_token
            .clone()
            .map(SessionToken::new)
            .ok_or_else(|| AppError::IdentityProvider("Token response has no id_token".to_string()))
    }

    fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }
}
