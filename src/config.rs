/// Configuration management for the recipes manager
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub keycloak: KeycloakConfig,
    pub session: SessionConfig,
    pub http: HttpClientConfig,
    pub admin: AdminConfig,
    pub drive: DriveConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Where the browser lands after a successful login
    pub app_root: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// OpenID Connect client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    /// Issuer URL, used as the discovery base
    pub address: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Public host the provider redirects back to
    pub host: String,
}

impl KeycloakConfig {
    /// Callback URL registered with the identity provider
    pub fn redirect_uri(&self) -> String {
        format!("http://{}/api/v1/oauth", self.host)
    }
}

/// Session cookie and login state settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_secure: bool,
    /// Session cookie lifetime in seconds
    pub max_age: i64,
    /// Correlation state lifetime in seconds
    pub state_ttl: i64,
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    pub timeout_secs: u64,
}

/// Account administration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Emails allowed to delete accounts
    pub emails: Vec<String>,
}

/// Markers that split a Drive export into sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub ingredients_marker: String,
    pub instructions_marker: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            ingredients_marker: "Zutaten".to_string(),
            instructions_marker: "Zubereitung".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("RECIPES_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("RECIPES_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let app_root = env::var("RECIPES_APP_ROOT").unwrap_or_else(|_| "/".to_string());

        let data_directory: PathBuf = env::var("RECIPES_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("RECIPES_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("recipes.sqlite"));

        let address = env::var("RECIPES_KEYCLOAK_ADDRESS")
            .map_err(|_| AppError::Validation("Keycloak address required".to_string()))?;
        let client_id = env::var("RECIPES_KEYCLOAK_CLIENT_ID")
            .map_err(|_| AppError::Validation("Keycloak client id required".to_string()))?;
        let client_secret = env::var("RECIPES_KEYCLOAK_CLIENT_SECRET")
            .map_err(|_| AppError::Validation("Keycloak client secret required".to_string()))?;
        let host = env::var("RECIPES_KEYCLOAK_HOST")
            .unwrap_or_else(|_| format!("{}:{}", hostname, port));

        let cookie_secure = env::var("RECIPES_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let max_age = env::var("RECIPES_SESSION_MAX_AGE")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);
        let state_ttl = env::var("RECIPES_STATE_TTL")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .unwrap_or(600);

        let timeout_secs = env::var("RECIPES_HTTP_TIMEOUT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        // Comma-separated list
        let admin_emails = env::var("RECIPES_ADMIN_EMAILS")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<String>>();

        let defaults = DriveConfig::default();
        let ingredients_marker = env::var("RECIPES_DRIVE_INGREDIENTS_MARKER")
            .unwrap_or(defaults.ingredients_marker);
        let instructions_marker = env::var("RECIPES_DRIVE_INSTRUCTIONS_MARKER")
            .unwrap_or(defaults.instructions_marker);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "recipes_manager=debug,tower_http=debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                app_root,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            keycloak: KeycloakConfig {
                address,
                client_id,
                client_secret,
                host,
            },
            session: SessionConfig {
                cookie_secure,
                max_age,
                state_ttl,
            },
            http: HttpClientConfig { timeout_secs },
            admin: AdminConfig {
                emails: admin_emails,
            },
            drive: DriveConfig {
                ingredients_marker,
                instructions_marker,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.keycloak.address.trim().is_empty() {
            return Err(AppError::Validation("Keycloak address cannot be empty".to_string()));
        }

        if self.keycloak.client_id.trim().is_empty() || self.keycloak.client_secret.is_empty() {
            return Err(AppError::Validation(
                "Keycloak client credentials cannot be empty".to_string(),
            ));
        }

        if self.drive.ingredients_marker.trim().is_empty()
            || self.drive.instructions_marker.trim().is_empty()
        {
            return Err(AppError::Validation("Drive markers cannot be empty".to_string()));
        }

        if self.session.max_age <= 0 || self.session.state_ttl <= 0 {
            return Err(AppError::Validation(
                "Session lifetimes must be positive".to_string(),
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(AppError::Validation("HTTP timeout must be positive".to_string()));
        }

        Ok(())
    }

    /// Whether the given verified email may administer accounts
    pub fn is_admin(&self, email: &str) -> bool {
        self.admin.emails.iter().any(|admin| admin.eq_ignore_ascii_case(email))
    }
}
