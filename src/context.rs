/// Application context and dependency injection
use crate::{
    account::AccountManager,
    auth::{
        provider::{IdentityProvider, KeycloakProvider},
        state::StateStore,
    },
    config::ServerConfig,
    db,
    error::{AppError, AppResult},
    recipes::RecipeStore,
    sources::{
        drive_parser::DriveRecipeParser,
        images::{HttpImageFetcher, ImageFetcher},
        SourceImporter,
    },
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub state_store: Arc<StateStore>,
    pub account_manager: Arc<AccountManager>,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub recipe_store: Arc<RecipeStore>,
    pub importer: Arc<SourceImporter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let timeout = Duration::from_secs(config.http.timeout_secs);

        // Discovery happens once; keys are cached for the process lifetime
        let identity_provider = KeycloakProvider::discover(&config.keycloak, timeout).await?;
        let image_fetcher = HttpImageFetcher::new(timeout)?;

        Ok(Self::from_parts(
            config,
            db,
            Arc::new(identity_provider),
            Arc::new(image_fetcher),
        ))
    }

    /// Wire services around an existing pool and provider
    pub fn from_parts(
        config: ServerConfig,
        db: SqlitePool,
        identity_provider: Arc<dyn IdentityProvider>,
        image_fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let state_store = Arc::new(StateStore::new(db.clone(), config.session.state_ttl));
        let account_manager = Arc::new(AccountManager::new(db.clone()));
        let recipe_store = Arc::new(RecipeStore::new(db.clone()));

        let parser = DriveRecipeParser::new(config.drive.clone(), image_fetcher);
        let importer = Arc::new(SourceImporter::new(parser, recipe_store.clone()));

        Self {
            config: Arc::new(config),
            db,
            state_store,
            account_manager,
            identity_provider,
            recipe_store,
            importer,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AppError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
