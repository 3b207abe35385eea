/// Shared fixtures for unit tests

use crate::{
    auth::{
        provider::IdentityProvider,
        token::{IdTokenVerifier, SessionToken},
    },
    config::{
        AdminConfig, DriveConfig, HttpClientConfig, KeycloakConfig, LoggingConfig, ServerConfig,
        ServiceConfig, SessionConfig, StorageConfig,
    },
    context::AppContext,
    error::{AppError, AppResult},
    sources::images::{encode_data_uri, ImageFetcher},
};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::Arc;

pub const TEST_ISSUER: &str = "https://sso.example.com/realms/recipes";
pub const TEST_AUDIENCE: &str = "recipes-manager";
pub const TEST_SECRET: &[u8] = b"recipes-manager-test-signing-key!";
pub const TEST_KID: &str = "test-key";

pub const DEFAULT_RECIPE_HTML: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/default-recipe.html"));

/// Single-connection in-memory database with migrations applied
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 8080,
            app_root: "/".to_string(),
        },
        storage: StorageConfig {
            data_directory: "./data".into(),
            database: "./data/recipes.sqlite".into(),
        },
        keycloak: KeycloakConfig {
            address: TEST_ISSUER.to_string(),
            client_id: TEST_AUDIENCE.to_string(),
            client_secret: "secret".to_string(),
            host: "localhost:8080".to_string(),
        },
        session: SessionConfig {
            cookie_secure: false,
            max_age: 3600,
            state_ttl: 600,
        },
        http: HttpClientConfig { timeout_secs: 5 },
        admin: AdminConfig {
            emails: vec!["admin@example.com".to_string()],
        },
        drive: DriveConfig::default(),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

pub fn test_verifier() -> IdTokenVerifier {
    IdTokenVerifier::from_key(
        TEST_ISSUER,
        TEST_AUDIENCE,
        Some(TEST_KID),
        DecodingKey::from_secret(TEST_SECRET),
    )
}

/// HS256 identity token expiring `expires_in` seconds from now
pub fn sign_id_token(email: Option<&str>, audience: &str, expires_in: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let mut claims = serde_json::json!({
        "iss": TEST_ISSUER,
        "aud": audience,
        "sub": "f6f1c0de-0000-4000-8000-000000000001",
        "iat": now,
        "exp": now + expires_in,
    });
    if let Some(email) = email {
        claims["email"] = serde_json::Value::String(email.to_string());
    }

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());

    encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).unwrap()
}

/// In-process provider: the authorization code is the email to sign in
///
/// `fail` makes the exchange fail and `no-email` yields a token without an
/// email claim.
pub struct FakeIdentityProvider {
    verifier: IdTokenVerifier,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self {
            verifier: test_verifier(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorization_url(&self, state: &str) -> AppResult<String> {
        Ok(format!("https://sso.example.com/auth?state={}", state))
    }

    async fn exchange_code(&self, code: &str) -> AppResult<SessionToken> {
        match code {
            "fail" => Err(AppError::IdentityProvider("exchange refused".to_string())),
            "no-email" => Ok(SessionToken::new(sign_id_token(None, TEST_AUDIENCE, 3600))),
            email => Ok(SessionToken::new(sign_id_token(
                Some(email),
                TEST_AUDIENCE,
                3600,
            ))),
        }
    }

    fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }
}

/// Returns the URL itself as picture bytes; URLs containing "broken" fail
pub struct FakeImageFetcher;

#[async_trait]
impl ImageFetcher for FakeImageFetcher {
    async fn fetch_data_uri(&self, url: &str) -> AppResult<String> {
        if url.contains("broken") {
            return Err(AppError::Download(format!("404 for {}", url)));
        }
        Ok(encode_data_uri(Some("image/jpeg"), url.as_bytes()))
    }
}

/// Context wired to an in-memory database and the fakes above
pub async fn test_context() -> AppContext {
    AppContext::from_parts(
        test_config(),
        memory_pool().await,
        Arc::new(FakeIdentityProvider::new()),
        Arc::new(FakeImageFetcher),
    )
}
